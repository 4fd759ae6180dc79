//! wicket-app — interactive login + live chat tail demo.
//!
//! Set `WICKET_GATEWAY_URL` (default `http://localhost:8080`) and run:
//!   cargo run -p wicket-app
//!
//! A saved session in `wicket.session` is reused; delete the file (or type
//! `/logout`) to start over.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use wicket_gateway::{
    sync, AuthError, ChatMessage, Client, Conversation, FileStore, FixedDelay, HttpTransport,
    LoginFlow, SessionStore, StepOutcome,
};

const SESSION_FILE: &str = "wicket.session";

#[tokio::main]
async fn main() {
    // Enable logging: RUST_LOG=wicket_gateway=info,wicket_app=info cargo run
    if std::env::var("RUST_LOG").is_err() {
        // SAFETY: single-threaded at this point, no other threads reading env
        unsafe { std::env::set_var("RUST_LOG", "wicket_gateway=info,wicket_app=info") };
    }
    env_logger::init();

    if let Err(e) = run().await {
        eprintln!("\n✗ {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let base_url = std::env::var("WICKET_GATEWAY_URL")
        .unwrap_or_else(|_| "http://localhost:8080".to_string());
    let transport = Arc::new(HttpTransport::new(&base_url)?);
    let store = Arc::new(FileStore::new(SESSION_FILE));

    // ── Session: reuse or sign in ─────────────────────────────────────────────
    let session = match store.load()? {
        Some(s) => {
            println!("Resuming session for {}", s.phone);
            s
        }
        None => sign_in(transport.clone(), store.clone()).await?,
    };
    let client = Client::new(transport, session);

    // ── Chat list ─────────────────────────────────────────────────────────────
    let chats = client.list_conversations().await?;
    if chats.is_empty() {
        println!("No conversations.");
        return Ok(());
    }
    print_chats(&chats);

    let picked = loop {
        let line = prompt("Open which chat (number, or /logout)? ")?;
        if line.trim() == "/logout" {
            store.clear()?;
            println!("Session cleared.");
            return Ok(());
        }
        match line.trim().parse::<usize>() {
            Ok(n) if n >= 1 && n <= chats.len() => break &chats[n - 1],
            _ => println!("Enter 1–{}", chats.len()),
        }
    };

    tail_chat(&client, picked).await
}

// ── Login flow ────────────────────────────────────────────────────────────────

async fn sign_in(
    transport: Arc<HttpTransport>,
    store: Arc<FileStore>,
) -> Result<wicket_gateway::Session, Box<dyn std::error::Error>> {
    let mut flow = LoginFlow::new(transport).with_store(store);

    loop {
        let phone = prompt("Phone number (international format): ")?;
        match flow.submit_phone(&phone).await {
            Ok(()) => break,
            Err(e) => println!("✗ {e}"),
        }
    }

    loop {
        let code = prompt("Enter the code you received: ")?;
        match flow.submit_code(&code).await {
            Ok(StepOutcome::Authenticated(s)) => {
                println!("✅ Signed in as {}", s.phone);
                return Ok(s);
            }
            Ok(StepOutcome::PasswordNeeded) => break,
            Err(e @ AuthError::Transport(_)) => return Err(e.into()),
            Err(e) => println!("✗ {e}"),
        }
    }

    loop {
        let password = prompt("2FA password: ")?;
        match flow.submit_password(&password).await {
            Ok(StepOutcome::Authenticated(s)) => {
                println!("✅ Signed in as {}", s.phone);
                return Ok(s);
            }
            Ok(StepOutcome::PasswordNeeded) => unreachable!("password step never requests itself"),
            Err(e @ AuthError::Transport(_)) => return Err(e.into()),
            Err(e) => println!("✗ {e}"),
        }
    }
}

// ── Live tail ─────────────────────────────────────────────────────────────────

async fn tail_chat(
    client: &Client,
    chat: &Conversation,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("── {} ── (type to send, /quit to leave)", chat.name);

    let history = client.fetch_history(&chat.id, 20).await?;
    for m in &history {
        print_message(m);
    }
    let mut shown = history.len();

    let unread: Vec<i64> = history
        .iter()
        .filter(|m| !m.is_read && !m.outbound)
        .map(|m| m.id)
        .collect();
    if !unread.is_empty() {
        if let Err(e) = client.mark_read(&chat.id, &unread).await {
            log::warn!("mark-read failed: {e}");
        }
    }

    let (handle, mut feed) = sync::spawn(
        client.clone(),
        chat.id.clone(),
        history,
        Arc::new(FixedDelay::default()),
    );

    // Blocking stdin reader feeding the async loop.
    let (input_tx, mut input_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines().map_while(Result::ok) {
            if input_tx.send(line).is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            snapshot = feed.next() => {
                let Some(snapshot) = snapshot else { break };
                for m in &snapshot[shown.min(snapshot.len())..] {
                    print_message(m);
                }
                shown = snapshot.len();
            }
            line = input_rx.recv() => {
                let Some(line) = line else { break };
                let text = line.trim();
                if text == "/quit" {
                    break;
                }
                if text.is_empty() {
                    continue;
                }
                match client.send_message(&chat.id, text).await {
                    Ok(()) => handle.echo(ChatMessage::local_echo(chat.id.clone(), text)),
                    Err(e) => println!("✗ send failed: {e}"),
                }
            }
        }
    }

    handle.join().await;
    Ok(())
}

// ── Console helpers ───────────────────────────────────────────────────────────

fn print_chats(chats: &[Conversation]) {
    println!("Conversations:");
    for (i, c) in chats.iter().enumerate() {
        let unread = if c.unread_count > 0 {
            format!(" ({} unread)", c.unread_count)
        } else {
            String::new()
        };
        println!("  {}. {}{}", i + 1, c.name, unread);
    }
}

fn print_message(m: &ChatMessage) {
    if m.outbound {
        println!("You: {}", m.text);
    } else {
        println!("{}: {}", m.sender, m.text);
    }
}

fn prompt(msg: &str) -> Result<String, Box<dyn std::error::Error>> {
    print!("{msg}");
    io::stdout().flush()?;
    let line = io::stdin()
        .lock()
        .lines()
        .next()
        .ok_or("stdin closed")??;
    Ok(line)
}
