use async_trait::async_trait;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::style::Stylize;
use crossterm::terminal::{self, ClearType};
use crossterm::{cursor, execute};
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const SPINNER_TICK: Duration = Duration::from_millis(100);
const INPUT_POLL: Duration = Duration::from_millis(50);

/// Operator-facing output. Diagnostics go through `tracing` instead.
pub trait Log: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn write_line(&self);
    fn start_wait(&self, message: &str);
    fn stop_wait(&self);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionOptions {
    pub question: String,
    pub default_value: Option<String>,
    pub options: Vec<String>,
    pub is_password: bool,
}

impl QuestionOptions {
    pub fn password(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            is_password: true,
            ..Self::default()
        }
    }

    pub fn select(
        question: impl Into<String>,
        options: Vec<String>,
        default_value: Option<String>,
    ) -> Self {
        Self {
            question: question.into(),
            default_value,
            options,
            is_password: false,
        }
    }

    /// Maps raw input onto an answer, `None` when the input is not acceptable.
    pub fn resolve_answer(&self, input: &str) -> Option<String> {
        let input = input.trim();
        if input.is_empty() {
            return self.default_value.clone();
        }
        if self.options.is_empty() {
            return Some(input.to_string());
        }
        if let Ok(index) = input.parse::<usize>()
            && (1..=self.options.len()).contains(&index)
        {
            return Some(self.options[index - 1].clone());
        }
        self.options.iter().find(|option| *option == input).cloned()
    }
}

/// Interactive question source. Dropping the returned future abandons the question.
#[async_trait]
pub trait Prompt: Send + Sync {
    async fn question(&self, options: &QuestionOptions) -> io::Result<String>;
}

#[derive(Default)]
pub struct TerminalLog {
    wait: Mutex<Option<JoinHandle<()>>>,
}

impl TerminalLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn take_spinner(&self) -> Option<JoinHandle<()>> {
        self.wait.lock().ok().and_then(|mut guard| guard.take())
    }
}

impl Log for TerminalLog {
    fn info(&self, message: &str) {
        self.stop_wait();
        eprintln!("{} {message}", "[info]".cyan());
    }

    fn warn(&self, message: &str) {
        self.stop_wait();
        eprintln!("{} {}", "[warn]".yellow().bold(), message.bold());
    }

    fn write_line(&self) {
        eprintln!();
    }

    fn start_wait(&self, message: &str) {
        self.stop_wait();
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            eprintln!("{message}");
            return;
        };
        let message = message.to_string();
        let task = runtime.spawn(async move {
            let mut frame = 0usize;
            loop {
                let mut stderr = io::stderr();
                let _ = write!(
                    stderr,
                    "\r{} {message}",
                    SPINNER_FRAMES[frame % SPINNER_FRAMES.len()]
                );
                let _ = stderr.flush();
                frame = frame.wrapping_add(1);
                tokio::time::sleep(SPINNER_TICK).await;
            }
        });
        if let Ok(mut guard) = self.wait.lock() {
            *guard = Some(task);
        }
    }

    fn stop_wait(&self) {
        if let Some(task) = self.take_spinner() {
            task.abort();
            let _ = execute!(
                io::stderr(),
                terminal::Clear(ClearType::CurrentLine),
                cursor::MoveToColumn(0)
            );
        }
    }
}

impl Drop for TerminalLog {
    fn drop(&mut self) {
        if let Some(task) = self.take_spinner() {
            task.abort();
        }
    }
}

pub struct TerminalPrompt;

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

#[async_trait]
impl Prompt for TerminalPrompt {
    async fn question(&self, options: &QuestionOptions) -> io::Result<String> {
        let mut stdout = io::stdout();
        for (index, option) in options.options.iter().enumerate() {
            writeln!(stdout, "  {}) {option}", index + 1)?;
        }
        loop {
            match &options.default_value {
                Some(default) => write!(stdout, "{} ({default}) ", options.question.clone().bold())?,
                None => write!(stdout, "{} ", options.question.clone().bold())?,
            }
            stdout.flush()?;

            let line = {
                let _raw = RawModeGuard::enable()?;
                let mut buffer = String::new();
                loop {
                    if let Some(line) = poll_line(&mut buffer, options.is_password)? {
                        break line;
                    }
                    tokio::time::sleep(INPUT_POLL).await;
                }
            };

            if let Some(answer) = options.resolve_answer(&line) {
                return Ok(answer);
            }
            if !options.options.is_empty() {
                writeln!(stdout, "Please choose one of the listed options")?;
            }
        }
    }
}

fn poll_line(buffer: &mut String, masked: bool) -> io::Result<Option<String>> {
    let mut stdout = io::stdout();
    while event::poll(Duration::from_millis(0))? {
        match event::read()? {
            Event::Key(key) => {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        write!(stdout, "\r\n")?;
                        return Err(io::Error::new(io::ErrorKind::Interrupted, "interrupted"));
                    }
                    KeyCode::Enter => {
                        write!(stdout, "\r\n")?;
                        stdout.flush()?;
                        return Ok(Some(std::mem::take(buffer)));
                    }
                    KeyCode::Backspace => {
                        if buffer.pop().is_some() {
                            write!(stdout, "\u{8} \u{8}")?;
                        }
                    }
                    KeyCode::Char(ch) => {
                        buffer.push(ch);
                        write!(stdout, "{}", if masked { '*' } else { ch })?;
                    }
                    _ => {}
                }
            }
            Event::Paste(text) => {
                let echoed = if masked {
                    "*".repeat(text.chars().count())
                } else {
                    text.clone()
                };
                buffer.push_str(&text);
                write!(stdout, "{echoed}")?;
            }
            _ => {}
        }
        stdout.flush()?;
    }
    Ok(None)
}
