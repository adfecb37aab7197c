//! Instruction templates for the two generation flows.
//!
//! Each template embeds the subject text between double quotes at the
//! `{text}` placeholder. The subject is untrusted (OCR output or a pasted
//! conversation); it is length-capped upstream but otherwise inserted as-is,
//! so a subject that reads like an instruction reaches the model as one.

/// Template for an opening line drawn from a dating-profile screenshot.
pub const OPENING_LINE_TEMPLATE: &str = "Craft a casual, flirty opening line for this dating profile: \"{text}\". Return only the pickup line, no additional text or explanations.";

/// Template for a reply to a pasted conversation message.
pub const REPLY_TEMPLATE: &str = "She said: \"{text}\". Suggest a witty, flirty reply. Return only the reply, no additional text or explanations.";

const PLACEHOLDER: &str = "{text}";

/// An instruction template paired with the text it wraps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest<'a> {
    pub instruction_template: &'static str,
    pub subject_text: &'a str,
}

impl<'a> PromptRequest<'a> {
    pub fn opening_line(profile_text: &'a str) -> Self {
        Self {
            instruction_template: OPENING_LINE_TEMPLATE,
            subject_text: profile_text,
        }
    }

    pub fn reply(conversation_text: &'a str) -> Self {
        Self {
            instruction_template: REPLY_TEMPLATE,
            subject_text: conversation_text,
        }
    }

    /// Substitute the subject into the template.
    ///
    /// Only the first placeholder is replaced so a subject that itself
    /// contains `{text}` is left untouched.
    pub fn render(&self) -> String {
        self.instruction_template
            .replacen(PLACEHOLDER, self.subject_text, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_have_exactly_one_placeholder() {
        assert_eq!(OPENING_LINE_TEMPLATE.matches(PLACEHOLDER).count(), 1);
        assert_eq!(REPLY_TEMPLATE.matches(PLACEHOLDER).count(), 1);
    }

    #[test]
    fn opening_line_embeds_profile_text_verbatim() {
        let p = PromptRequest::opening_line("Loves hiking & \"tacos\"").render();
        assert_eq!(
            p,
            "Craft a casual, flirty opening line for this dating profile: \"Loves hiking & \"tacos\"\". Return only the pickup line, no additional text or explanations."
        );
    }

    #[test]
    fn reply_embeds_conversation_text() {
        let p = PromptRequest::reply("hey you up?").render();
        assert!(p.starts_with("She said: \"hey you up?\"."));
        assert!(p.ends_with("Return only the reply, no additional text or explanations."));
    }

    #[test]
    fn subject_placeholder_is_not_expanded_twice() {
        let p = PromptRequest::reply("{text}").render();
        assert!(p.starts_with("She said: \"{text}\"."));
        assert!(!p.contains("She said: \"She said"));
    }
}
