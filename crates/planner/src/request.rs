//! Planning request assembly and final message composition.

use plotmaster_config::ApiSettings;
use plotmaster_core::message::Message;
use plotmaster_core::provider::ProviderRequest;

/// Build the completion request for one planning call.
///
/// Order: main prompt, system prompt, worldbook block, history, user message.
/// Empty prompt fields and an empty worldbook are omitted.
pub fn build_planning_request(
    user_message: &str,
    history: &[Message],
    api: &ApiSettings,
    worldbook: &str,
) -> ProviderRequest {
    let mut messages = Vec::with_capacity(history.len() + 4);

    if !api.main_prompt.trim().is_empty() {
        messages.push(Message::system(api.main_prompt.clone()));
    }
    if !api.system_prompt.trim().is_empty() {
        messages.push(Message::system(api.system_prompt.clone()));
    }
    if !worldbook.trim().is_empty() {
        messages.push(Message::system(format!("<worldbook>\n{worldbook}\n</worldbook>")));
    }
    messages.extend(history.iter().cloned());
    messages.push(Message::user(user_message));

    ProviderRequest {
        model: api.model.clone(),
        messages,
        temperature: api.temperature,
        max_tokens: Some(api.max_tokens),
        stop: Vec::new(),
    }
}

/// `"{user}\n\n{directive}\n{body}"`
pub fn compose_final_message(user_message: &str, directive: &str, body: &str) -> String {
    format!("{user_message}\n\n{directive}\n{body}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotmaster_core::message::Role;

    fn api() -> ApiSettings {
        let mut api = ApiSettings::default();
        api.main_prompt = "MAIN".into();
        api.system_prompt = "SYS".into();
        api.model = "deepseek-chat".into();
        api.max_tokens = 1024;
        api.temperature = 0.3;
        api
    }

    #[test]
    fn request_orders_messages() {
        let history = vec![Message::assistant("prev")];
        let req = build_planning_request("go north", &history, &api(), "dragons live here");

        let shape: Vec<(Role, &str)> = req
            .messages
            .iter()
            .map(|m| (m.role.clone(), m.content.as_str()))
            .collect();
        assert_eq!(
            shape,
            vec![
                (Role::System, "MAIN"),
                (Role::System, "SYS"),
                (Role::System, "<worldbook>\ndragons live here\n</worldbook>"),
                (Role::Assistant, "prev"),
                (Role::User, "go north"),
            ]
        );
        assert_eq!(req.model, "deepseek-chat");
        assert_eq!(req.max_tokens, Some(1024));
        assert!((req.temperature - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_sections_are_omitted() {
        let mut api = api();
        api.system_prompt = String::new();
        let req = build_planning_request("hi", &[], &api, "  ");
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].content, "MAIN");
        assert_eq!(req.messages[1].content, "hi");
    }

    #[test]
    fn final_message_layout() {
        assert_eq!(
            compose_final_message("I open the door.", "[Directive]", "<plot>beat</plot>"),
            "I open the door.\n\n[Directive]\n<plot>beat</plot>"
        );
    }
}
