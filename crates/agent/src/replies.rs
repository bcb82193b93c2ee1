//! Fixed user-facing text: templates, dialogue prompts and the generator's
//! guardrail instructions. Nothing here carries internal error detail.

use admitline_config::InstitutionConfig;
use admitline_core::contact::{ContactRequest, QueryType};
use admitline_core::cutoff::RelaxableField;

use crate::contact::{ContactStep, DialogueState, InvalidInput};

/// Templates bound to one institution.
#[derive(Debug, Clone)]
pub struct Replies {
    name: String,
    short_name: String,
    admissions_email: String,
    admissions_phone: String,
    fraud_helpline: String,
}

impl Replies {
    pub fn new(institution: &InstitutionConfig) -> Self {
        Self {
            name: institution.name.clone(),
            short_name: institution.short_name.clone(),
            admissions_email: institution.admissions_email.clone(),
            admissions_phone: institution.admissions_phone.clone(),
            fraud_helpline: institution.fraud_helpline.clone(),
        }
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn fraud_helpline(&self) -> &str {
        &self.fraud_helpline
    }

    pub fn greeting(&self) -> String {
        format!(
            "Hello! Welcome to the {} ({}) admissions assistant.\n\n\
             I can help you with:\n\
             • Admission process and eligibility\n\
             • Branch-wise cutoff ranks\n\
             • Required documents\n\
             • Fee structure and scholarships\n\
             • Campus and hostel information\n\n\
             How can I assist you today?",
            self.name, self.short_name
        )
    }

    pub fn out_of_scope(&self) -> String {
        format!(
            "I can assist only with admissions information related to {} ({}). \
             For other colleges, please refer to their official websites or counselling authorities.",
            self.name, self.short_name
        )
    }

    /// Degraded reply when a collaborator failed.
    pub fn apology(&self) -> String {
        format!(
            "Sorry, I couldn't put together an answer right now. Please try again in a moment, \
             or reach the admissions office at {} or {}.",
            self.admissions_email, self.admissions_phone
        )
    }

    /// Where to go when the assistant cannot help.
    pub fn fallback_contact(&self) -> String {
        format!("Email: {}\nPhone: {}", self.admissions_email, self.admissions_phone)
    }

    // ── Cutoffs ───────────────────────────────────────────────────────────

    /// Ask for the fields a cutoff lookup still needs.
    pub fn missing_cutoff_fields(&self, missing: &[&str]) -> String {
        let mut reply = String::from("To look up cutoff ranks I need a little more detail. Please tell me your ");
        reply.push_str(&join_words(missing));
        reply.push('.');
        if missing.contains(&"branch") {
            reply.push_str(
                "\n\nBranches include CSE, CSM (AI & ML), CSD (Data Science), CSC (Cyber Security), \
                 IT, ECE, EEE, EIE, ME, CIV and AUT, or say \"all branches\".",
            );
        }
        if missing.contains(&"category") {
            reply.push_str("\n\nCategories: OC, BC-A, BC-B, BC-C, BC-D, BC-E, SC, ST, EWS.");
        }
        reply
    }

    pub fn no_cutoff_data(&self, description: &str) -> String {
        format!(
            "I don't have cutoff data for {description}. I won't guess a number; \
             the admissions office can confirm:\n\n{}",
            self.fallback_contact()
        )
    }

    pub fn relaxed_caveat(&self, relaxed: &[RelaxableField]) -> String {
        let fields: Vec<&str> = relaxed.iter().map(|f| f.as_str()).collect();
        format!(
            "Note: there was no exact match, so these figures ignore the {} you gave.",
            join_words(&fields)
        )
    }

    // ── Contact dialogue ──────────────────────────────────────────────────

    /// The question for the dialogue's current state.
    pub fn contact_prompt(&self, state: &DialogueState) -> String {
        match state.step {
            ContactStep::AwaitingName => {
                "I'd be happy to connect you with our admission team.\n\nMay I have your full name?\n\n\
                 (You can say \"cancel\" at any time.)"
                    .to_string()
            }
            ContactStep::AwaitingEmail => format!(
                "Thank you, {}! What's your email address?",
                state.draft.name.as_deref().unwrap_or("there")
            ),
            ContactStep::AwaitingPhone => "Great! What's your phone number?".to_string(),
            ContactStep::AwaitingQueryType => format!(
                "Thank you! What is this regarding?\n\n1. {}\n2. {}\n3. {}\n4. {}\n\n\
                 Reply with the number or a short description.",
                QueryType::FraudReport.label(),
                QueryType::GeneralInquiry.label(),
                QueryType::Dissatisfied.label(),
                QueryType::Other.label(),
            ),
            ContactStep::AwaitingMessage => {
                "Almost done! Would you like to add a message or any details?\n\n\
                 (Or reply \"skip\" to submit now.)"
                    .to_string()
            }
            ContactStep::Complete => self.contact_cancelled(),
        }
    }

    pub fn contact_invalid(&self, invalid: InvalidInput) -> String {
        match invalid {
            InvalidInput::Name => "Please provide your full name (at least 2 characters).",
            InvalidInput::Email => {
                "That doesn't look like a valid email address. Please enter your email \
                 (e.g., student@example.com)."
            }
            InvalidInput::Phone => {
                "Please provide a valid phone number with at least 10 digits (e.g., 9876543210)."
            }
        }
        .to_string()
    }

    pub fn contact_submitted(&self, request: &ContactRequest) -> String {
        let mut reply = format!(
            "Request submitted. Thank you, {}! Our admission team has received your request \
             and will reach out within 24 hours.\n\n\
             Email: {}\nPhone: {}\nRegarding: {}\n\nReference ID: {}",
            request.name,
            request.email,
            request.phone,
            request.query_type.label(),
            request.reference_id,
        );
        if !request.query_type.phone_visible() {
            reply.push_str(
                "\n\nNote: your phone number is kept private and will not be shared with the \
                 admission team for this request type.",
            );
        }
        if request.query_type == QueryType::FraudReport {
            reply.push_str(&format!(
                "\n\nFor urgent fraud reports you can also call the helpline at {}.",
                self.fraud_helpline
            ));
        }
        reply
    }

    pub fn contact_cancelled(&self) -> String {
        "No problem, I've cancelled that request. Is there anything else I can help with?".to_string()
    }

    pub fn contact_failed(&self) -> String {
        format!(
            "There was an issue submitting your request. Please contact our admission team directly:\n\n{}",
            self.fallback_contact()
        )
    }

    // ── Generator instructions ────────────────────────────────────────────

    /// System instructions for every generation call.
    pub fn guardrails(&self, fraud_related: bool) -> String {
        let mut rules = format!(
            "You are the official admissions assistant for {name} ({short}).\n\
             Rules:\n\
             - Answer only questions about {short}. If asked about any other institution, \
             politely decline and do not compare, rank or describe it.\n\
             - Use only the cutoff data and reference passages provided below. Quote cutoff \
             ranks exactly as given and never estimate or invent a rank, fee or date.\n\
             - If the information is not provided, say so and suggest contacting the \
             admissions office at {email} or {phone}.\n\
             - Keep answers concise and friendly.\n",
            name = self.name,
            short = self.short_name,
            email = self.admissions_email,
            phone = self.admissions_phone,
        );
        if fraud_related {
            rules.push_str(&format!(
                "- The user raised a fraud concern. Advise them not to pay unofficial agents and \
                 share the fraud helpline {}.\n",
                self.fraud_helpline
            ));
        } else {
            rules.push_str("- Do not share the fraud-report helpline number.\n");
        }
        rules
    }
}

/// "a", "a and b", "a, b and c".
fn join_words(words: &[&str]) -> String {
    match words {
        [] => String::new(),
        [one] => one.to_string(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::ContactDraft;

    fn replies() -> Replies {
        Replies::new(&InstitutionConfig::default())
    }

    #[test]
    fn templates_name_the_institution() {
        let r = replies();
        assert!(r.greeting().contains("VNRVJIET"));
        assert!(r.out_of_scope().contains("only with admissions information"));
    }

    #[test]
    fn guardrails_gate_fraud_helpline() {
        let r = replies();
        assert!(!r.guardrails(false).contains(r.fraud_helpline()));
        assert!(r.guardrails(true).contains(r.fraud_helpline()));
    }

    #[test]
    fn email_prompt_uses_name() {
        let state = DialogueState {
            step: ContactStep::AwaitingEmail,
            draft: ContactDraft { name: Some("Asha".into()), ..Default::default() },
        };
        assert!(replies().contact_prompt(&state).starts_with("Thank you, Asha!"));
    }

    #[test]
    fn failure_reply_offers_fallback_channel() {
        let reply = replies().contact_failed();
        assert!(reply.contains("admissions@vnrvjiet.ac.in"));
        assert!(reply.contains("+91-40-2304 2758"));
    }

    #[test]
    fn missing_fields_prompt() {
        let reply = replies().missing_cutoff_fields(&["branch", "category"]);
        assert!(reply.contains("branch and category"));
        assert!(reply.contains("BC-D"));
    }

    #[test]
    fn word_lists() {
        assert_eq!(join_words(&["gender"]), "gender");
        assert_eq!(join_words(&["gender", "quota"]), "gender and quota");
        assert_eq!(join_words(&["a", "b", "c"]), "a, b and c");
    }
}
