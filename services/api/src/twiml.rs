//! Call-control document handed to the telephony provider.

use crate::config::RelayTarget;

/// Renders the TwiML that connects a call to the ConversationRelay WebSocket.
///
/// The output depends only on `target`, so identical configuration always
/// yields byte-identical documents.
pub fn render(target: &RelayTarget) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <Response>\n\
         <Connect>\n\
         <ConversationRelay url=\"{}\" welcomeGreeting=\"{}\" ttsProvider=\"{}\" voice=\"{}\" />\n\
         </Connect>\n\
         </Response>",
        escape_attr(&target.ws_url),
        escape_attr(&target.welcome_greeting),
        escape_attr(&target.tts_provider),
        escape_attr(&target.voice),
    )
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
