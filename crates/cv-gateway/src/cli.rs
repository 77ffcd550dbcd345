//! CLI (Command Line Interface) mode
//!
//! Interactive REPL that plays the part of one WhatsApp contact. Messages go
//! through the same conversation handler and contact store as the webhook
//! server; replies are printed instead of sent.

use std::sync::Arc;

use async_trait::async_trait;
use cv_core::{ContactManager, ContactRepository, Outcome, Script};
use cv_whatsapp::{AgentNotifier, ConversationHandler, MessageSender};
use nu_ansi_term::{Color, Style};
use reedline::{
    ColumnarMenu, Completer, DefaultHinter, Emacs, KeyCode, KeyModifiers, Keybindings,
    MenuBuilder, Prompt, Reedline, ReedlineEvent, ReedlineMenu, Signal, Suggestion,
};
use tracing::info;

/// Available commands for autocomplete display
const COMMANDS: &[(&str, &str)] = &[
    ("/help", "ヘルプを表示"),
    ("/exit", "プログラムを終了"),
    ("/quit", "プログラムを終了"),
    ("/status", "連絡先の状態を表示"),
    ("/history", "やり取りの履歴を表示"),
    ("/metrics", "集計結果を表示"),
    ("/phone", "電話番号を切り替え (/phone <番号>)"),
    ("/poll", "キーワード投票に送信 (/poll <テキスト>)"),
];

/// Command completer for reedline
#[derive(Clone)]
pub struct CommandCompleter {
    commands: Vec<(&'static str, &'static str)>,
}

impl CommandCompleter {
    pub fn new() -> Self {
        Self {
            commands: COMMANDS.to_vec(),
        }
    }
}

impl Default for CommandCompleter {
    fn default() -> Self {
        Self::new()
    }
}

impl Completer for CommandCompleter {
    fn complete(&mut self, line: &str, pos: usize) -> Vec<Suggestion> {
        if !line.starts_with('/') {
            return Vec::new();
        }

        self.commands
            .iter()
            .filter(|(cmd, _)| cmd.starts_with(line))
            .map(|(cmd, desc)| Suggestion {
                value: cmd.to_string(),
                description: Some(desc.to_string()),
                extra: None,
                span: reedline::Span::new(0, pos),
                append_whitespace: true,
                style: None,
            })
            .collect()
    }
}

/// Prompt showing the simulated phone number
struct ColoredPrompt {
    style: Style,
    phone: String,
}

impl ColoredPrompt {
    fn new(phone: &str) -> Self {
        Self {
            style: Color::Cyan.bold(),
            phone: phone.to_string(),
        }
    }
}

impl Prompt for ColoredPrompt {
    fn render_prompt_left(&self) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Owned(self.style.paint(format!("{}> ", self.phone)).to_string())
    }

    fn render_prompt_right(&self) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _prompt_mode: reedline::PromptEditMode) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Borrowed("")
    }

    fn render_prompt_multiline_indicator(&self) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Borrowed("")
    }

    fn render_prompt_history_search_indicator(
        &self,
        _history_search: reedline::PromptHistorySearch,
    ) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Borrowed("")
    }
}

/// Prints bot replies to the terminal
struct ConsoleSender;

#[async_trait]
impl MessageSender for ConsoleSender {
    async fn send_text(&self, _to: &str, body: &str) -> Option<String> {
        println!("\n{}\n", Color::Green.paint(format!("🤖 {}", body)));
        Some(body.to_string())
    }
}

/// Prints handoff requests to the terminal
struct ConsoleNotifier;

#[async_trait]
impl AgentNotifier for ConsoleNotifier {
    async fn notify(&self, phone: &str, reason: Option<Outcome>) {
        let reason = reason.map_or_else(|| "-".to_string(), |r| r.to_string());
        println!(
            "{}",
            Color::Yellow.paint(format!("📞 アドバイザーへ引き継ぎ: {} ({})", phone, reason))
        );
    }
}

/// Parsed console command
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Exit,
    Help,
    Status,
    History,
    Metrics,
    Phone(String),
    Poll(String),
    Unknown(String),
}

/// Parse a `/command`; plain text returns `None`
fn parse_command(input: &str) -> Option<Command> {
    if !input.starts_with('/') {
        return None;
    }

    let (name, rest) = match input.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (input, ""),
    };

    let command = match name.to_lowercase().as_str() {
        "/exit" | "/quit" | "/q" => Command::Exit,
        "/help" | "/?" => Command::Help,
        "/status" => Command::Status,
        "/history" => Command::History,
        "/metrics" => Command::Metrics,
        "/phone" if !rest.is_empty() => Command::Phone(rest.to_string()),
        "/poll" if !rest.is_empty() => Command::Poll(rest.to_string()),
        _ => Command::Unknown(input.to_string()),
    };

    Some(command)
}

/// Run CLI interactive mode
pub async fn run_cli(store: ContactManager, script: Script, phone: String) -> anyhow::Result<()> {
    let repository: Arc<dyn ContactRepository> = Arc::new(store);
    let handler = ConversationHandler::new(
        Arc::clone(&repository),
        Arc::new(ConsoleSender),
        Arc::new(ConsoleNotifier),
        script,
    );

    info!("Starting CLI mode");

    print_welcome();

    // Setup keybindings
    let mut keybindings = default_keybindings();

    // Trigger completion on '/' key
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Char('/'),
        ReedlineEvent::Edit(vec![reedline::EditCommand::Complete]),
    );

    let menu = Box::new(
        ColumnarMenu::default()
            .with_name("command_menu")
            .with_columns(1)
            .with_column_width(Some(40))
            .with_only_buffer_difference(false),
    );

    let hinter = DefaultHinter::default().with_style(Style::new().dimmed());

    let mut line_editor = Reedline::create()
        .with_completer(Box::new(CommandCompleter::new()))
        .with_menu(ReedlineMenu::EngineCompleter(menu))
        .with_hinter(Box::new(hinter))
        .with_edit_mode(Box::new(Emacs::new(keybindings)));

    let mut prompt = ColoredPrompt::new(&phone);

    loop {
        let signal = line_editor.read_line(&prompt);

        match signal {
            Ok(Signal::Success(line)) => {
                let input = line.trim();

                if input.is_empty() {
                    continue;
                }

                match parse_command(input) {
                    None => {
                        if let Err(e) = handler.handle_message(&prompt.phone, input).await {
                            eprintln!("\n❌ エラー: {}\n", e);
                        }
                    }
                    Some(Command::Exit) => {
                        println!("\n👋 さようなら！\n");
                        break;
                    }
                    Some(Command::Phone(next)) => {
                        println!("\n✅ 電話番号を {} に切り替えました。\n", next);
                        prompt = ColoredPrompt::new(&next);
                    }
                    Some(command) => {
                        if let Err(e) = run_command(&handler, &prompt.phone, command).await {
                            eprintln!("\n❌ エラー: {}\n", e);
                        }
                    }
                }
            }
            Ok(Signal::CtrlC) => {
                println!("^C");
                continue;
            }
            Ok(Signal::CtrlD) => {
                println!("\n👋 さようなら！\n");
                break;
            }
            Err(err) => {
                eprintln!("\n❌ エラー: {}\n", err);
                break;
            }
        }
    }

    Ok(())
}

/// Commands that read or write the store
async fn run_command(
    handler: &ConversationHandler,
    phone: &str,
    command: Command,
) -> anyhow::Result<()> {
    let repository = handler.repository();

    match command {
        Command::Help => print_help(),
        Command::Status => match repository.get(phone).await? {
            Some(contact) => {
                println!();
                println!("📋 {}", contact.phone);
                println!("  状態: {}", contact.state);
                println!(
                    "  回答: {}",
                    contact.outcome.map_or_else(|| "-".to_string(), |o| o.to_string())
                );
                println!("  地域: {}", contact.locality.as_deref().unwrap_or("-"));
                println!("  配信停止: {}", if contact.opt_out { "はい" } else { "いいえ" });
                println!();
            }
            None => println!("\n📋 {} はまだ登録されていません。\n", phone),
        },
        Command::History => {
            let records = repository.interactions(phone).await?;
            println!();
            println!("📜 やり取りの履歴 ({} 件):", records.len());
            println!("{}", "─".repeat(50));
            for (i, record) in records.iter().enumerate() {
                println!(
                    "{}. [{}] 👤 {} / 🤖 {}",
                    i + 1,
                    record.created_at.format("%Y-%m-%d %H:%M:%S"),
                    record.received_text.replace('\n', " "),
                    record.sent_text.as_deref().unwrap_or("(未送信)").replace('\n', " ")
                );
            }
            println!("{}", "─".repeat(50));
            println!();
        }
        Command::Metrics => {
            let report = repository.metrics().await?;
            println!("\n{}\n", serde_json::to_string_pretty(&report)?);
        }
        Command::Poll(text) => {
            let reply = handler.handle_quick_poll(phone, &text).await?;
            println!("\n{}\n", Color::Green.paint(format!("🗳 {}", reply)));
        }
        Command::Unknown(input) => {
            eprintln!("\n❓ 不明なコマンド: {}。/help でコマンド一覧を確認してください。\n", input);
        }
        Command::Exit | Command::Phone(_) => {}
    }

    Ok(())
}

/// Default keybindings for reedline
fn default_keybindings() -> Keybindings {
    let mut keybindings = Keybindings::new();
    // Tab key triggers completion
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Tab,
        ReedlineEvent::Edit(vec![reedline::EditCommand::Complete]),
    );
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Enter, ReedlineEvent::Submit);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Esc, ReedlineEvent::Esc);
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Char('c'), ReedlineEvent::CtrlC);
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Char('d'), ReedlineEvent::CtrlD);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Up, ReedlineEvent::Up);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Down, ReedlineEvent::Down);
    keybindings
}

/// Print welcome message
fn print_welcome() {
    println!();
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║          🗳  canvass-gateway CLI - 対話モード               ║");
    println!("╠════════════════════════════════════════════════════════════╣");
    println!("║  連絡先としてメッセージを入力し Enter で送信               ║");
    println!("║  コマンド: /help, /status, /history, /metrics, /exit       ║");
    println!("║  / を入力するとコマンド候補が表示されます                   ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();
}

/// Print help message
fn print_help() {
    println!();
    println!("📖 利用可能なコマンド:");
    for (cmd, desc) in COMMANDS {
        println!("  {} - {}", cmd, desc);
    }
    println!();
    println!("💡 ヒント: / から入力するとコマンド候補が表示されます");
    println!();
}
