mod ui;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use crossterm::cursor::SetCursorStyle;
use crossterm::event::{self, Event, KeyCode, KeyEvent};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use vikey::ViHandler;
use vikey::exec::Prompt;
use vikey::handler::StatusSink;
use vikey::mode::Mode;
use vikey::textbuf::{RopeBuffer, TextBuffer};

#[derive(Parser)]
#[command(name = "vikey", about = "A modal text editor built on the vikey interpreter")]
struct Cli {
    /// File to open
    file: PathBuf,
}

/// State of the command/search input line opened by `:`, `/` or `?`.
pub struct PromptState {
    kind: Prompt,
    pub input: String,
}

impl PromptState {
    fn new(kind: Prompt) -> Self {
        Self {
            kind,
            input: String::new(),
        }
    }

    pub fn leader(&self) -> char {
        match self.kind {
            Prompt::Command => ':',
            Prompt::SearchForward => '/',
            Prompt::SearchBackward => '?',
        }
    }
}

pub struct App {
    pub buffer: RopeBuffer,
    pub vi: ViHandler,
    pub status: String,
    pub prompt: Option<PromptState>,
    pub running: bool,
}

/// Collects the interpreter's notifications for one key event.
#[derive(Default)]
struct EventSink {
    status: Option<String>,
    prompt: Option<Prompt>,
}

impl StatusSink for EventSink {
    fn show_status(&mut self, text: &str) {
        self.status = Some(text.to_string());
    }

    fn open_prompt(&mut self, prompt: Prompt) {
        self.prompt = Some(prompt);
    }
}

impl App {
    fn new(buffer: RopeBuffer) -> Self {
        let vi = ViHandler::new();
        let status = vi.mode().to_string();
        Self {
            buffer,
            vi,
            status,
            prompt: None,
            running: true,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        if self.prompt.is_some() {
            return self.handle_prompt_key(key);
        }

        let mut sink = EventSink::default();
        let consumed = self.vi.handle_key(key, &mut self.buffer, &mut sink);
        if let Some(text) = sink.status {
            self.status = text;
        }
        if let Some(kind) = sink.prompt {
            self.prompt = Some(PromptState::new(kind));
        }
        if consumed {
            return Ok(());
        }

        // Keys the interpreter hands back: literal input in insert mode,
        // plus arrow navigation in either mode.
        match key.code {
            KeyCode::Left => self.buffer.move_left(1, false),
            KeyCode::Right => self.buffer.move_right(1, false),
            KeyCode::Up => self.buffer.move_up(1, false),
            KeyCode::Down => self.buffer.move_down(1, false),
            _ if self.vi.mode() == Mode::Insert => match key.code {
                KeyCode::Enter => self.buffer.type_newline(),
                KeyCode::Backspace => self.buffer.backspace(),
                KeyCode::Char(c) => self.buffer.type_char(c),
                _ => {}
            },
            _ => {}
        }
        Ok(())
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) -> Result<()> {
        let Some(prompt) = self.prompt.as_mut() else {
            return Ok(());
        };
        match key.code {
            KeyCode::Esc => {
                self.prompt = None;
            }
            KeyCode::Backspace => {
                // Erasing past the leader closes the prompt.
                if prompt.input.pop().is_none() {
                    self.prompt = None;
                }
            }
            KeyCode::Enter => {
                let done = self
                    .prompt
                    .take()
                    .ok_or_else(|| anyhow::anyhow!("prompt vanished"))?;
                match done.kind {
                    Prompt::Command => self.execute_command(done.input.trim())?,
                    Prompt::SearchForward => self.execute_search(&done.input, true),
                    Prompt::SearchBackward => self.execute_search(&done.input, false),
                }
            }
            KeyCode::Char(c) => prompt.input.push(c),
            _ => {}
        }
        Ok(())
    }

    /// Run an ex-style command line. Returns Err on write failures.
    fn execute_command(&mut self, cmd: &str) -> Result<()> {
        // A bare line number jumps to that line (`:123`).
        if let Ok(n) = cmd.parse::<usize>() {
            let target = if n == 0 {
                0
            } else {
                (n - 1).min(self.buffer.line_count().saturating_sub(1))
            };
            let start = self.buffer.line_start(target);
            self.buffer.set_pos(start);
            return Ok(());
        }

        match cmd {
            "w" => self.buffer.write()?,
            "q" => self.running = false,
            "wq" => {
                self.buffer.write()?;
                self.running = false;
            }
            "w!" => {
                if let Err(e) = self.buffer.write() {
                    self.status = format!("write failed: {e}");
                }
            }
            "q!" => self.running = false,
            "wq!" => match self.buffer.write() {
                Ok(()) => self.running = false,
                Err(e) => self.status = format!("write failed: {e}"),
            },
            _ => log::debug!("ignoring unknown command {cmd:?}"),
        }

        Ok(())
    }

    fn execute_search(&mut self, pattern: &str, forward: bool) {
        if pattern.is_empty() {
            return;
        }
        let from = if forward {
            (self.buffer.pos() + 1).min(self.buffer.len_chars())
        } else {
            self.buffer.pos().saturating_sub(1)
        };
        let hit = self
            .buffer
            .find_text(pattern, from, forward, false)
            .or_else(|| {
                // Wrap around from the far end.
                let edge = if forward { 0 } else { self.buffer.len_chars() };
                self.buffer.find_text(pattern, edge, forward, false)
            });
        match hit {
            Some(pos) => {
                self.buffer.set_pos(pos);
                self.buffer.remember_search(pattern, forward, false);
            }
            None => self.status = format!("pattern not found: {pattern}"),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let buffer = RopeBuffer::from_file(cli.file)?;
    let mut app = App::new(buffer);

    // Set up terminal
    terminal::enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main event loop
    let result = run_loop(&mut terminal, &mut app);

    // Teardown — always runs, even if the loop errored
    terminal::disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        SetCursorStyle::DefaultUserShape,
        LeaveAlternateScreen
    )?;

    result
}


fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    while app.running {
        let viewport_height = terminal.size()?.height.saturating_sub(1) as usize;
        app.buffer.set_view_height(viewport_height);
        app.buffer.adjust_scroll();

        let style = if app.buffer.is_block_caret() {
            SetCursorStyle::SteadyBlock
        } else {
            SetCursorStyle::SteadyBar
        };
        crossterm::execute!(terminal.backend_mut(), style)?;

        terminal.draw(|frame| {
            ui::draw(frame, app);
        })?;

        if let Event::Key(key) = event::read()? {
            app.handle_key(key)?;
        }
    }
    Ok(())
}
