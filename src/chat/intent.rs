//! Keyword intent matching for the invoice assistant.
//!
//! Classification is pure: it maps text plus a snapshot of the conversation
//! to an [`Intent`], the reply text, and an optional [`Effect`] that the
//! controller carries out.

use crate::db::Invoice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    SignInRedirect,
    SignInNudge,
    SaveConversation,
    LoadConversation,
    Upload,
    Savings,
    RecentHistory,
    Help,
    About,
    Fallback,
}

/// Side effect requested by a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    NavigateToSignIn,
    PromptSessionTitle,
    OpenSessionsPanel,
    OpenFilePicker,
}

#[derive(Debug, Clone, Copy)]
pub struct ClassifyContext<'a> {
    pub signed_in: bool,
    pub session_active: bool,
    /// Known invoices, newest first.
    pub invoices: &'a [Invoice],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub intent: Intent,
    pub text: String,
    pub effect: Option<Effect>,
}

pub const SIGN_IN_NUDGE: &str =
    "You'll need to sign in to use all features. Would you like to go to the login page?";
pub const SIGN_IN_REDIRECT: &str = "I'll take you to the login page. One moment please...";
pub const ASK_SESSION_TITLE: &str =
    "I'll create a new chat session for you. What would you like to name it?";
pub const ALREADY_SAVING: &str = "This conversation is already being saved automatically!";
pub const OPENING_SESSIONS: &str =
    "Opening your saved conversations panel. You can select one to continue.";
pub const READY_TO_UPLOAD: &str =
    "Ready to analyze your invoice. Please upload it using the button below:";
pub const UPLOAD_FIRST: &str =
    "I need to analyze an invoice first. Please upload one to get started.";
pub const MILK_SAVINGS: &str = "I found cheaper options for Organic Milk:\n\
    • Trader Joe's: $3.99 (save $1.00)\n\
    • Walmart: $4.49 (save $0.50)";
pub const BREAD_SAVINGS: &str = "Here are better prices for Sourdough Bread:\n\
    • Local Bakery: $4.99 (save $0.50)\n\
    • Kroger: $4.79 (save $0.70)";
pub const GENERIC_SAVINGS: &str = "Based on your latest invoice, you could save $5.70 (12.5%) \
    by shopping for these items at alternative stores.";
pub const NO_HISTORY: &str =
    "You don't have any invoice history yet. Upload your first invoice to get started!";
pub const HELP: &str = "I can help with:\n\
    • Invoice analysis and savings\n\
    • Finding cheaper alternatives\n\
    • Showing purchase patterns\n\
    • Tracking spending across stores\n\
    • Saving and managing conversations\n\n\
    Try asking \"Find cheaper alternatives\" or \"Save this conversation\"";
pub const ABOUT: &str = "Invoke is a smart invoice assistant that helps you track expenses, \
    find savings, and compare prices across stores. Upload receipts and I'll analyze them to \
    help you save money on future purchases!";
pub const FALLBACK: &str = "I'm your invoice assistant. I can analyze receipts, find savings, \
    track spending, and save our conversations. Upload an invoice or ask about your purchase \
    history to get started!";

type Predicate = fn(&str, &ClassifyContext<'_>) -> bool;

/// Evaluated top to bottom; the first match wins.
const RULES: &[(Intent, Predicate)] = &[
    (Intent::SignInRedirect, wants_sign_in),
    (Intent::Help, anonymous_help),
    (Intent::SignInNudge, anonymous),
    (Intent::SaveConversation, wants_save_conversation),
    (Intent::LoadConversation, wants_load_conversation),
    (Intent::Upload, wants_upload),
    (Intent::Savings, wants_savings),
    (Intent::RecentHistory, wants_history),
    (Intent::Help, wants_help),
    (Intent::About, wants_about),
];

fn wants_sign_in(m: &str, _: &ClassifyContext<'_>) -> bool {
    m.contains("login") || m.contains("sign in")
}

fn anonymous_help(m: &str, ctx: &ClassifyContext<'_>) -> bool {
    !ctx.signed_in && wants_help(m, ctx)
}

fn anonymous(_: &str, ctx: &ClassifyContext<'_>) -> bool {
    !ctx.signed_in
}

fn wants_save_conversation(m: &str, _: &ClassifyContext<'_>) -> bool {
    m.contains("save") && any(m, &["chat", "conversation"])
}

fn wants_load_conversation(m: &str, _: &ClassifyContext<'_>) -> bool {
    any(m, &["load", "view", "show"]) && any(m, &["chat", "conversation", "history"])
}

fn wants_upload(m: &str, _: &ClassifyContext<'_>) -> bool {
    any(m, &["upload", "invoice", "receipt", "scan"])
}

fn wants_savings(m: &str, _: &ClassifyContext<'_>) -> bool {
    any(m, &["cheaper", "save", "alternative", "deal", "price"])
}

fn wants_history(m: &str, _: &ClassifyContext<'_>) -> bool {
    any(m, &["recent", "history", "previous", "past"])
}

fn wants_help(m: &str, _: &ClassifyContext<'_>) -> bool {
    m.contains("help")
}

fn wants_about(m: &str, _: &ClassifyContext<'_>) -> bool {
    any(m, &["about", "what", "how"])
}

pub fn classify(text: &str, ctx: &ClassifyContext<'_>) -> Reply {
    let message = text.to_lowercase();
    let intent = RULES
        .iter()
        .find(|(_, matches)| matches(&message, ctx))
        .map_or(Intent::Fallback, |(intent, _)| *intent);

    let (text, effect) = respond(intent, &message, ctx);
    Reply {
        intent,
        text,
        effect,
    }
}

fn respond(intent: Intent, message: &str, ctx: &ClassifyContext<'_>) -> (String, Option<Effect>) {
    match intent {
        Intent::SignInRedirect => (SIGN_IN_REDIRECT.into(), Some(Effect::NavigateToSignIn)),
        Intent::SignInNudge => (SIGN_IN_NUDGE.into(), None),
        Intent::SaveConversation if ctx.session_active => (ALREADY_SAVING.into(), None),
        Intent::SaveConversation => (ASK_SESSION_TITLE.into(), Some(Effect::PromptSessionTitle)),
        Intent::LoadConversation => (OPENING_SESSIONS.into(), Some(Effect::OpenSessionsPanel)),
        Intent::Upload => (READY_TO_UPLOAD.into(), Some(Effect::OpenFilePicker)),
        Intent::Savings if ctx.invoices.is_empty() => (UPLOAD_FIRST.into(), None),
        Intent::Savings if message.contains("milk") => (MILK_SAVINGS.into(), None),
        Intent::Savings if message.contains("bread") => (BREAD_SAVINGS.into(), None),
        Intent::Savings => (GENERIC_SAVINGS.into(), None),
        Intent::RecentHistory if ctx.invoices.is_empty() => (NO_HISTORY.into(), None),
        Intent::RecentHistory => (recent_invoices(ctx.invoices), None),
        Intent::Help => (HELP.into(), None),
        Intent::About => (ABOUT.into(), None),
        Intent::Fallback => (FALLBACK.into(), None),
    }
}

fn recent_invoices(invoices: &[Invoice]) -> String {
    let mut response = String::from("Here are your recent invoices:\n");
    for invoice in invoices.iter().take(3) {
        response.push_str(&format!(
            "• {}: ${:.2} - {}\n",
            invoice.date.format("%m/%d/%Y"),
            invoice.amount,
            invoice.description
        ));
    }
    response.push_str(
        "\nYou can say \"Show me savings for March\" or \"Compare Target vs Walmart\" for more insights.",
    );
    response
}

fn any(message: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| message.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn invoice(description: &str, amount: f64) -> Invoice {
        Invoice {
            id: description.to_string(),
            user_id: "u1".to_string(),
            amount,
            date: Utc.with_ymd_and_hms(2024, 3, 14, 12, 0, 0).unwrap(),
            status: "Pending".to_string(),
            description: description.to_string(),
            items: None,
            savings: None,
        }
    }

    fn signed_in(invoices: &[Invoice]) -> ClassifyContext<'_> {
        ClassifyContext {
            signed_in: true,
            session_active: false,
            invoices,
        }
    }

    const ANONYMOUS: ClassifyContext<'static> = ClassifyContext {
        signed_in: false,
        session_active: false,
        invoices: &[],
    };

    #[test]
    fn test_help_regardless_of_context() {
        let invoices = [invoice("Welcome Invoice", 1000.0)];
        for ctx in [ANONYMOUS, signed_in(&[]), signed_in(&invoices)] {
            let reply = classify("help", &ctx);
            assert_eq!(reply.intent, Intent::Help);
            assert_eq!(reply.text, HELP);
        }
    }

    #[test]
    fn test_anonymous_gets_nudge() {
        for text in ["show me savings", "upload", "save this chat", "hello there", "about"] {
            let reply = classify(text, &ANONYMOUS);
            assert_eq!(reply.intent, Intent::SignInNudge, "{text}");
            assert_eq!(reply.text, SIGN_IN_NUDGE);
            assert_eq!(reply.effect, None);
        }
    }

    #[test]
    fn test_sign_in_mentions_redirect() {
        for ctx in [ANONYMOUS, signed_in(&[])] {
            let reply = classify("How do I LOGIN?", &ctx);
            assert_eq!(reply.intent, Intent::SignInRedirect);
            assert_eq!(reply.effect, Some(Effect::NavigateToSignIn));
        }
        assert_eq!(
            classify("please sign in", &ANONYMOUS).intent,
            Intent::SignInRedirect
        );
    }

    #[test]
    fn test_save_conversation_depends_on_session() {
        let reply = classify("Save this conversation", &signed_in(&[]));
        assert_eq!(reply.text, ASK_SESSION_TITLE);
        assert_eq!(reply.effect, Some(Effect::PromptSessionTitle));

        let ctx = ClassifyContext {
            session_active: true,
            ..signed_in(&[])
        };
        let reply = classify("save chat", &ctx);
        assert_eq!(reply.text, ALREADY_SAVING);
        assert_eq!(reply.effect, None);
    }

    #[test]
    fn test_order_prefers_conversation_over_history() {
        let reply = classify("show my chat history", &signed_in(&[]));
        assert_eq!(reply.intent, Intent::LoadConversation);
        assert_eq!(reply.effect, Some(Effect::OpenSessionsPanel));

        let reply = classify("I want to scan a receipt", &signed_in(&[]));
        assert_eq!(reply.intent, Intent::Upload);
        assert_eq!(reply.effect, Some(Effect::OpenFilePicker));
    }

    #[test]
    fn test_savings_needs_an_invoice() {
        let reply = classify("find cheaper alternatives", &signed_in(&[]));
        assert_eq!(reply.intent, Intent::Savings);
        assert_eq!(reply.text, UPLOAD_FIRST);

        let invoices = [invoice("Groceries", 45.6)];
        let ctx = signed_in(&invoices);
        assert_eq!(classify("cheaper milk?", &ctx).text, MILK_SAVINGS);
        assert_eq!(classify("best bread deal", &ctx).text, BREAD_SAVINGS);
        assert_eq!(classify("any price drops", &ctx).text, GENERIC_SAVINGS);
    }

    #[test]
    fn test_recent_history_lists_three() {
        assert_eq!(classify("my past spending", &signed_in(&[])).text, NO_HISTORY);

        let invoices = [
            invoice("A", 1.0),
            invoice("B", 2.5),
            invoice("C", 3.0),
            invoice("D", 4.0),
        ];
        let reply = classify("recent purchases", &signed_in(&invoices));
        assert_eq!(reply.intent, Intent::RecentHistory);
        assert!(reply.text.contains("• 03/14/2024: $2.50 - B"));
        assert!(!reply.text.contains("- D"));
    }

    #[test]
    fn test_about_and_fallback() {
        assert_eq!(classify("what is this", &signed_in(&[])).intent, Intent::About);
        let reply = classify("good morning", &signed_in(&[]));
        assert_eq!(reply.intent, Intent::Fallback);
        assert_eq!(reply.text, FALLBACK);
    }
}
