use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use invoke_assistant::{
    app::App,
    auth::TracingOutbox,
    chat::Effect,
    config::Config,
    db::{self, MessageRole, TokenRepository},
    error::{AppError, Notice},
    invoices::CannedAnalyzer,
};

const COMMANDS: &str = "\
Commands:
  :signup <email> <password> [confirm]   create an account
  :signin <email> <password>             sign in
  :signout                               sign out
  :reset <email>                         send a password reset link
  :reset-confirm <token> <new-password>  finish a password reset
  :verify <token>                        confirm your email
  :name <display name>                   change the name the assistant uses
  :verified                              check verification status
  :resend                                resend the verification email
  :attach                                get ready to upload an invoice
  :upload <path>                         upload an invoice file
  :new [title]                           start a new conversation
  :title <title>                         name the conversation you asked to save
  :cancel                                dismiss the title prompt
  :sessions                              toggle saved conversations
  :open <n>                              open saved conversation n
  :more                                  load more of this conversation
  :history                               page back through your history
  :invoices                              list recent invoices
  :dashboard                             show your dashboard
  :commands                              show this list
  :quit                                  exit
Anything else is sent to the assistant.";

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,invoke_assistant=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("🚀 Starting Invoke assistant v{}...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded");

    let pool = db::connect(&config).await?;
    tracing::info!("✅ Database ready: {}", config.database_url);

    let mut app = App::new(config, pool.clone(), Arc::new(TracingOutbox), Arc::new(CannedAnalyzer));

    // Expired verification and reset links
    {
        let pool = pool.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(3600));
            loop {
                interval.tick().await;
                match TokenRepository::cleanup_expired(&pool).await {
                    Ok(removed) => tracing::debug!("🧹 Removed {} expired tokens", removed),
                    Err(e) => tracing::error!("❌ Token cleanup failed: {}", e),
                }
            }
        });
    }

    {
        let throttle = app.throttle().clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            loop {
                interval.tick().await;
                throttle.cleanup().await;
                tracing::debug!("🧹 Sign-in throttle cleaned up");
            }
        });
    }

    println!("{}\n", COMMANDS);
    let mut rendered = 0u64;
    render(&mut app, &mut rendered);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == ":quit" {
            break;
        }

        if let Err(e) = handle_line(&mut app, line).await {
            print_notice(&e.notice());
        }
        if let Err(e) = app.sync_auth_state().await {
            tracing::error!("❌ Auth state sync failed: {}", e);
        }
        render(&mut app, &mut rendered);
    }

    tracing::info!("👋 Bye");
    Ok(())
}

async fn handle_line(app: &mut App, line: &str) -> Result<(), AppError> {
    if !line.starts_with(':') {
        app.conversation.set_input(line);
        if let Some(effect) = app.conversation.submit_input().await {
            show_effect(app, effect);
        }
        return Ok(());
    }

    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();
    let arg = |i: usize| args.get(i).copied().unwrap_or_default();

    match command {
        ":signup" => {
            let confirm = args.get(2).copied();
            let identity = app.credentials.signup(arg(0), arg(1), confirm).await?;
            println!(
                "Account created for {}! Check your inbox to verify it, then sign in.",
                identity.email
            );
        }
        ":signin" => {
            app.credentials.signin(arg(0), arg(1)).await?;
        }
        ":signout" => app.credentials.signout().await?,
        ":reset" => {
            app.credentials.reset_password(arg(0)).await?;
            println!("Password reset email sent! Check your inbox and spam/junk folder.");
        }
        ":reset-confirm" => {
            app.credentials.confirm_password_reset(arg(0), arg(1)).await?;
            println!("Password updated. You can sign in with it now.");
        }
        ":verify" => {
            app.credentials.confirm_email(arg(0)).await?;
            println!("Email verified!");
        }
        ":name" => {
            app.update_display_name(&args.join(" ")).await?;
            println!("Display name updated.");
        }
        ":verified" => {
            app.credentials.check_verification().await?;
            println!("Your email is verified.");
        }
        ":resend" => {
            app.credentials.resend_verification().await?;
            println!("Verification email sent.");
        }
        ":attach" => {
            let effect = app.conversation.request_upload();
            show_effect(app, effect);
        }
        ":upload" => {
            let path = args.join(" ");
            let bytes = tokio::fs::read(&path).await?;
            let name = std::path::Path::new(&path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or(path.clone());
            app.conversation.upload_file(&name, &bytes).await;
        }
        ":new" => {
            let title = args.join(" ");
            let title = (!title.is_empty()).then_some(title.as_str());
            app.conversation.create_new_session(title).await;
        }
        ":title" => {
            let title = args.join(" ");
            if !app.conversation.is_title_prompt_pending() || title.is_empty() {
                println!("Nothing to name right now.");
            } else {
                app.conversation.create_new_session(Some(&title)).await;
            }
        }
        ":cancel" => app.conversation.cancel_title_prompt(),
        ":sessions" => {
            app.conversation.toggle_sessions_panel().await;
            if app.conversation.is_sessions_panel_open() {
                print_sessions(app);
            }
        }
        ":open" => {
            let index: usize = arg(0)
                .parse()
                .map_err(|_| AppError::NotFound(format!("No saved conversation {}", arg(0))))?;
            let id = app
                .conversation
                .sessions()
                .get(index.wrapping_sub(1))
                .map(|s| s.id.clone())
                .ok_or_else(|| AppError::NotFound(format!("No saved conversation {}", index)))?;
            app.conversation.select_session(&id).await;
            if app.conversation.has_more_session_messages() {
                println!("  (more messages available, type :more)");
            }
        }
        ":more" => {
            if app.conversation.load_more().await == 0 {
                println!("No more messages in this conversation.");
            } else if app.conversation.has_more_session_messages() {
                println!("  (more to come, type :more)");
            }
        }
        ":history" => {
            let page = app.conversation.load_history().await;
            for message in &page {
                println!("  [{}] {}", role_tag(message.role), message.content);
            }
            if !app.conversation.has_more_history() {
                println!("  (beginning of history)");
            }
        }
        ":invoices" => {
            app.conversation.refresh_invoices().await;
        }
        ":dashboard" => {
            let view = app.dashboard().await?;
            println!(
                "Dashboard for {} <{}>{}",
                view.display_name,
                view.email,
                if view.email_verified { "" } else { " (unverified)" }
            );
            for invoice in &view.invoices {
                println!(
                    "  {}  ${:>9.2}  {:<10} {}",
                    invoice.date.format("%m/%d/%Y"),
                    invoice.amount,
                    invoice.status,
                    invoice.description
                );
            }
        }
        ":commands" => println!("{}", COMMANDS),
        other => println!("Unknown command {}. Type :commands for help.", other),
    }
    Ok(())
}

fn show_effect(app: &App, effect: Effect) {
    match effect {
        Effect::NavigateToSignIn => println!("→ Sign in with :signin <email> <password>"),
        Effect::PromptSessionTitle => println!("→ Name it with :title <title> (or :cancel)"),
        Effect::OpenSessionsPanel => print_sessions(app),
        Effect::OpenFilePicker => println!("→ Upload with :upload <path>"),
    }
}

fn print_sessions(app: &App) {
    let sessions = app.conversation.sessions();
    if sessions.is_empty() {
        println!("No saved conversations yet");
        return;
    }
    for (i, session) in sessions.iter().enumerate() {
        let active = app.conversation.session_id() == Some(session.id.as_str());
        println!(
            "  {}{}. {} ({})",
            if active { "*" } else { " " },
            i + 1,
            session.title,
            db::models::to_datetime(session.last_message_at).format("%m/%d/%Y")
        );
    }
}

fn render(app: &mut App, rendered: &mut u64) {
    for message in app.conversation.messages() {
        if message.local_id <= *rendered {
            continue;
        }
        println!("[{}] {}", role_tag(message.role), message.content);
        *rendered = message.local_id;
    }
    if let Some(status) = app.conversation.upload_status() {
        println!("  … {}", status);
    }
    for notice in app.conversation.take_notices() {
        print_notice(&notice);
    }
}

fn print_notice(notice: &Notice) {
    println!("{}", notice);
}

fn role_tag(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "you",
        MessageRole::Bot => "bot",
    }
}
