//! Locally synthesized system messages.

use crate::{config::AppFlavor, state::MessageButton};

/// Body and optional call-to-action of a system message
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SystemMessage {
    pub html: &'static str,
    pub button: Option<(&'static str, &'static str)>,
}

impl SystemMessage {
    pub fn button(&self) -> Option<MessageButton> {
        self.button.map(|(action, text)| MessageButton {
            action: action.to_string(),
            text: text.to_string(),
        })
    }
}

const WELCOME_SELAH: SystemMessage = SystemMessage {
    html: "Welcome! This app is a free gift from Gracious Tech, a Christian apps ministry.",
    button: Some(("fund_selah", "More apps by us")),
};

const WELCOME_SINGIT: SystemMessage = SystemMessage {
    html: "Welcome to Singit Cloud!",
    button: None,
};

// No <p>: it adds margin inside the message bubble
const TIPS_ADMIN: SystemMessage = SystemMessage {
    html: "Get started:<ol>\
        <li><strong>Edit playlist &amp; invite guests</strong></li>\
        <li><strong>Start call in another app</strong></li>\
        <li><strong>Use earphones</strong> (so no echo)</li>\
        </ol><em>\"How To Use\"</em> tab has more tips",
    button: None,
};

const TIPS_GUEST: SystemMessage = SystemMessage {
    html: "Quick tips:<ol>\
        <li><strong>Use earphones</strong> (so no echo)</li>\
        <li><strong>Check out <em>\"How To Use\"</em> tab</strong></li>\
        </ol>",
    button: None,
};

/// Messages shown on entering a room: a welcome, then role-specific tips
pub(crate) fn on_enter(flavor: AppFlavor, admin: bool) -> [SystemMessage; 2] {
    let welcome = match flavor {
        AppFlavor::Selah => WELCOME_SELAH,
        AppFlavor::Singit => WELCOME_SINGIT,
    };
    let tips = if admin { TIPS_ADMIN } else { TIPS_GUEST };
    [welcome, tips]
}
