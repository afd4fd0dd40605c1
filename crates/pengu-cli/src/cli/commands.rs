use anyhow::{bail, Context, Result};
use colored::Colorize;
use dialoguer::Password;
use pengu_client::models::Role;
use pengu_client::notice::{self, Notice, NoticeLevel};
use pengu_client::{Config, HttpGateway, LiveListener, SessionFile, Store};
use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;

/// One store per invocation; identity comes back from the session file.
pub struct App {
    pub store: Store<HttpGateway>,
    pub notices: UnboundedReceiver<Notice>,
    pub config: Config,
}

pub fn open_app() -> Result<App> {
    let config = Config::load().context("Failed to load configuration")?;
    let gateway = HttpGateway::new(&config.api.base_url);
    let session = SessionFile::default_path()?;
    let (tx, notices) = notice::channel();
    Ok(App {
        store: Store::new(gateway, session, tx),
        notices,
        config,
    })
}

fn print_notice(notice: &Notice) {
    match notice.level {
        NoticeLevel::Success => println!("{}", notice.message.green()),
        NoticeLevel::Error => eprintln!("{}", notice.message.red()),
        NoticeLevel::Info => println!("{}", notice.message),
    }
}

fn drain_notices(notices: &mut UnboundedReceiver<Notice>) {
    while let Ok(notice) = notices.try_recv() {
        print_notice(&notice);
    }
}

pub async fn login(app: &mut App, email: &str) -> Result<()> {
    let password = Password::new().with_prompt("Password").interact()?;
    let ok = app.store.login(email, &password).await;
    drain_notices(&mut app.notices);
    if !ok {
        bail!("login failed");
    }
    Ok(())
}

pub async fn register(app: &mut App, name: &str, email: &str, role: &str) -> Result<()> {
    let role = match role {
        "student" => Role::Student,
        "expert" => Role::Expert,
        other => bail!("unknown role '{other}', expected student or expert"),
    };
    let password = Password::new()
        .with_prompt("Password")
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()?;
    let ok = app.store.register(name, email, &password, role).await;
    drain_notices(&mut app.notices);
    if !ok {
        bail!("registration failed");
    }
    Ok(())
}

pub fn logout(app: &mut App) {
    app.store.logout();
    drain_notices(&mut app.notices);
}

pub fn whoami(app: &App, json: bool) -> Result<()> {
    match &app.store.current_user {
        Some(user) => {
            if json {
                println!("{}", serde_json::to_string(user)?);
            } else {
                println!("{} <{}>", user.display_name().bold(), user.email);
                println!("role: {}", json!(user.role).as_str().unwrap_or("?"));
                if user.role == Role::Student {
                    println!("credits: {}", user.pengu_credits);
                }
            }
        }
        None => println!("Not signed in. Run 'pengu login <email>' first."),
    }
    Ok(())
}

pub async fn pull(app: &mut App, json: bool) -> Result<()> {
    app.store.load_all().await;
    drain_notices(&mut app.notices);

    let summary = json!({
        "experts": app.store.experts.len(),
        "requests": app.store.requests.len(),
        "quotes": app.store.quotes.len(),
        "orders": app.store.orders.len(),
        "notifications": app.store.notifications.len(),
        "messages": app.store.messages.len(),
    });
    if json {
        println!("{summary}");
        return Ok(());
    }
    println!("Synchronized:");
    for (name, count) in summary.as_object().into_iter().flatten() {
        println!("  {:>4}  {}", count, name);
    }
    Ok(())
}

/// Keep the push channel open and apply events until Ctrl-C.
pub async fn watch(app: &mut App) -> Result<()> {
    let Some(user) = app.store.current_user.clone() else {
        bail!("not signed in");
    };

    app.store.load_all().await;
    drain_notices(&mut app.notices);

    let events_url = app.config.events_url();
    let mut listener = LiveListener::spawn(&events_url, Some(&user.id), user.token.as_deref())
        .context("Failed to start live listener")?;
    println!("Watching {} (Ctrl-C to stop)", events_url);

    loop {
        tokio::select! {
            event = listener.recv() => {
                match event {
                    Some(event) => app.store.handle_event(event).await,
                    None => break,
                }
                drain_notices(&mut app.notices);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    listener.detach();
    Ok(())
}

pub async fn list_requests(app: &mut App, json: bool) -> Result<()> {
    app.store.load_all().await;
    drain_notices(&mut app.notices);
    if json {
        println!("{}", serde_json::to_string(&app.store.requests)?);
        return Ok(());
    }
    if app.store.requests.is_empty() {
        println!("No requests. Submit one with 'pengu request new <title>'");
        return Ok(());
    }
    for request in &app.store.requests {
        let status = json!(request.status);
        println!(
            "{}  {}  {}",
            request.id.dimmed(),
            status.as_str().unwrap_or("?"),
            request.title
        );
    }
    Ok(())
}

pub async fn new_request(
    app: &mut App,
    title: &str,
    description: Option<&str>,
    budget: Option<f64>,
) -> Result<()> {
    let payload = json!({
        "title": title,
        "description": description,
        "budget": budget,
    });
    let ok = app.store.create_request(payload).await;
    drain_notices(&mut app.notices);
    if !ok {
        bail!("request not submitted");
    }
    Ok(())
}

pub async fn notifications(app: &mut App, read_all: bool, json: bool) -> Result<()> {
    app.store.load_all().await;
    drain_notices(&mut app.notices);
    if json {
        println!("{}", serde_json::to_string(&app.store.notifications)?);
    } else if app.store.notifications.is_empty() {
        println!("No notifications.");
    } else {
        for notification in &app.store.notifications {
            let marker = if notification.read { " " } else { "*" };
            println!("{} {}", marker.cyan(), notification.title);
        }
    }

    if read_all {
        app.store.mark_all_notifications_read().await;
        drain_notices(&mut app.notices);
    }
    Ok(())
}
