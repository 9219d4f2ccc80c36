mod ui;

use clap::Parser;
use crossterm::{
    event::{
        KeyCode, KeyModifiers, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
        PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    fs,
    io,
    time::Duration,
};

use recite::config::{Config, ConfigStore, FileConfigStore};
use recite::passage::{Passage, PassageSummary};
use recite::runtime::{AppEvent, CrosstermEventSource, Runner};
use recite::seeds::seed_passages;
use recite::session::{PracticeSession, SessionOutcome};
use recite::store::PassageDb;

const TICK_RATE_MS: u64 = 100;

/// terminal trainer for memorizing text passages by first-letter recall
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Practice memorizing stored passages by typing the first letter of each word. Correct guesses reveal the word; three misses reveal it as an error. Health per passage decays daily and recovers with practice."
)]
pub struct Cli {
    /// add (or replace) a passage with this name; reads --file
    #[clap(short = 'a', long)]
    add: Option<String>,

    /// file containing the passage text, used with --add
    #[clap(short = 'f', long)]
    file: Option<String>,

    /// list stored passages and exit
    #[clap(short = 'l', long)]
    list: bool,

    /// delete the named passage and exit
    #[clap(short = 'd', long)]
    delete: Option<String>,

    /// export the practice history as CSV to this path and exit
    #[clap(short = 'e', long)]
    export: Option<String>,

    /// install the bundled sample passages and exit
    #[clap(long)]
    seed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppState {
    Picker,
    Practice,
    Results,
    Stats,
}

pub struct App {
    pub config: Config,
    pub store: PassageDb,
    pub state: AppState,
    pub passages: Vec<PassageSummary>,
    pub selected: usize,
    pub session: Option<PracticeSession>,
    pub last_outcome: Option<SessionOutcome>,
    pub stats_passage: Option<Passage>,
}

impl App {
    pub fn new(store: PassageDb, config: Config) -> Result<Self, Box<dyn Error>> {
        let passages = store.list_passages()?;
        Ok(Self {
            config,
            store,
            state: AppState::Picker,
            passages,
            selected: 0,
            session: None,
            last_outcome: None,
            stats_passage: None,
        })
    }

    fn refresh_passages(&mut self) -> Result<(), Box<dyn Error>> {
        self.passages = self.store.list_passages()?;
        if self.selected >= self.passages.len() {
            self.selected = self.passages.len().saturating_sub(1);
        }
        Ok(())
    }

    fn selected_name(&self) -> Option<&str> {
        self.passages.get(self.selected).map(|p| p.name.as_str())
    }

    fn start_practice(&mut self) -> Result<(), Box<dyn Error>> {
        let Some(name) = self.selected_name().map(str::to_string) else {
            return Ok(());
        };
        if let Some(passage) = self.store.get_passage(&name)? {
            let mut session = PracticeSession::new(&passage);
            // Degenerate passages complete at construction
            if session.is_completed() {
                self.finish_session(&mut session)?;
            } else {
                self.session = Some(session);
                self.state = AppState::Practice;
            }
        }
        Ok(())
    }

    fn finish_session(&mut self, session: &mut PracticeSession) -> Result<(), Box<dyn Error>> {
        if let Some(outcome) = session.take_outcome() {
            self.store.record_practice(
                &session.passage_name,
                &outcome.record,
                outcome.new_health,
            )?;
            self.last_outcome = Some(outcome);
            self.refresh_passages()?;
            self.state = AppState::Results;
        }
        Ok(())
    }

    fn open_stats(&mut self) -> Result<(), Box<dyn Error>> {
        if let Some(name) = self.selected_name().map(str::to_string) {
            self.stats_passage = self.store.get_passage(&name)?;
            if self.stats_passage.is_some() {
                self.state = AppState::Stats;
            }
        }
        Ok(())
    }

    /// Abandon the current practice without recording anything.
    fn exit_practice(&mut self) {
        self.session = None;
        self.state = AppState::Picker;
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let store = PassageDb::new()?;

    if run_management_commands(&cli, &store)? {
        return Ok(());
    }

    let config = FileConfigStore::new().load();
    let mut app = App::new(store, config)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    // Key release events (for hint hold) need the kitty keyboard protocol;
    // fall back silently where the terminal lacks it.
    let enhanced = supports_keyboard_enhancement().unwrap_or(false);
    if enhanced {
        execute!(
            io::stdout(),
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )?;
    }

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_tui(&mut terminal, &mut app, enhanced);

    if enhanced {
        let _ = execute!(io::stdout(), PopKeyboardEnhancementFlags);
    }
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// Handle the non-interactive flags. Returns true when the invocation is
/// complete and the TUI should not start.
fn run_management_commands(cli: &Cli, store: &PassageDb) -> Result<bool, Box<dyn Error>> {
    let mut handled = false;

    if cli.seed {
        for (name, text) in seed_passages() {
            store.upsert_passage(&name, &text)?;
            println!("seeded {}", name);
        }
        handled = true;
    }

    if let Some(name) = &cli.add {
        let Some(path) = &cli.file else {
            return Err("--add requires --file <path>".into());
        };
        let text = fs::read_to_string(path)?;
        store.upsert_passage(name, &text)?;
        println!("added {}", name);
        handled = true;
    }

    if let Some(name) = &cli.delete {
        if store.delete_passage(name)? {
            println!("deleted {}", name);
        } else {
            println!("no passage named {}", name);
        }
        handled = true;
    }

    if cli.list {
        for summary in store.list_passages()? {
            match summary.health {
                Some(health) => println!(
                    "{}  health {:.2}%  practices {}",
                    summary.name, health, summary.practice_count
                ),
                None => println!("{}  (never practiced)", summary.name),
            }
        }
        handled = true;
    }

    if let Some(path) = &cli.export {
        let file = fs::File::create(path)?;
        store.export_csv(file)?;
        println!("exported practice history to {}", path);
        handled = true;
    }

    Ok(handled)
}

fn run_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    release_events: bool,
) -> Result<(), Box<dyn Error>> {
    let events = CrosstermEventSource::new(release_events);
    let runner = Runner::new(events, Duration::from_millis(TICK_RATE_MS));

    loop {
        terminal.draw(|f| draw(app, f))?;

        match runner.step() {
            AppEvent::Tick | AppEvent::Resize => {}
            AppEvent::HintHold => {
                if let Some(session) = app.session.as_mut() {
                    session.hold_hint();
                }
            }
            AppEvent::HintRelease => {
                if let Some(session) = app.session.as_mut() {
                    session.release_hint();
                }
            }
            AppEvent::Key(key) => {
                if key.modifiers.contains(KeyModifiers::CONTROL)
                    && key.code == KeyCode::Char('c')
                {
                    break;
                }

                match app.state {
                    AppState::Picker => match key.code {
                        KeyCode::Esc | KeyCode::Char('q') => break,
                        KeyCode::Up | KeyCode::Char('k') => {
                            app.selected = app.selected.saturating_sub(1);
                        }
                        KeyCode::Down | KeyCode::Char('j') => {
                            if app.selected + 1 < app.passages.len() {
                                app.selected += 1;
                            }
                        }
                        KeyCode::Enter => app.start_practice()?,
                        KeyCode::Char('s') => app.open_stats()?,
                        _ => {}
                    },
                    AppState::Practice => match key.code {
                        KeyCode::Esc => app.exit_practice(),
                        KeyCode::Char(c) => {
                            let mut finished = false;
                            if let Some(session) = app.session.as_mut() {
                                session.submit_key(c);
                                finished = session.is_completed();
                            }
                            if finished {
                                if let Some(mut session) = app.session.take() {
                                    app.finish_session(&mut session)?;
                                }
                            }
                        }
                        _ => {}
                    },
                    AppState::Results => match key.code {
                        KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => {
                            app.last_outcome = None;
                            app.state = AppState::Picker;
                        }
                        KeyCode::Char('r') => {
                            app.last_outcome = None;
                            app.start_practice()?;
                        }
                        KeyCode::Char('s') => app.open_stats()?,
                        _ => {}
                    },
                    AppState::Stats => match key.code {
                        KeyCode::Esc | KeyCode::Char('b') | KeyCode::Char('q') => {
                            app.stats_passage = None;
                            app.state = AppState::Picker;
                        }
                        _ => {}
                    },
                }
            }
        }
    }

    Ok(())
}

fn draw(app: &App, f: &mut Frame) {
    f.render_widget(app, f.area());
}
