//! TUI module - Terminal dashboard with ratatui

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, List, ListItem, Paragraph, Row, Table, Wrap},
};
use std::io::{stdout, Stdout};

use crate::coach::CoachingService;
use crate::db::PersistenceGateway;
use crate::engine::{next_day_index, ProgressionEngine};
use crate::error::Unsaved;
use crate::manager::WorkoutManager;
use crate::model::{format_weight, UserWorkoutData};
use crate::settings::Language;
use crate::transaction::{CompletedWorkout, Completion};

type Tui = Terminal<CrosstermBackend<Stdout>>;

/// App state for TUI
pub struct App<'a, G, C> {
    manager: &'a WorkoutManager<G>,
    coach: &'a C,
    language: Language,
    status: String,
    tip: Option<String>,
    should_quit: bool,
}

impl<'a, G: PersistenceGateway, C: CoachingService> App<'a, G, C> {
    pub fn new(manager: &'a WorkoutManager<G>, coach: &'a C, language: Language) -> Self {
        Self {
            manager,
            coach,
            language,
            status: String::new(),
            tip: None,
            should_quit: false,
        }
    }

    /// Run the TUI application
    pub async fn run(&mut self) -> Result<()> {
        let mut terminal = init_terminal()?;

        let result = self.event_loop(&mut terminal).await;

        restore_terminal()?;
        result
    }

    async fn event_loop(&mut self, terminal: &mut Tui) -> Result<()> {
        while !self.should_quit {
            let data = self.manager.snapshot();
            let engine = self.manager.engine();
            terminal.draw(|frame| self.render(frame, &data, &engine))?;
            self.handle_events().await?;
        }
        Ok(())
    }

    fn render(&self, frame: &mut Frame, data: &UserWorkoutData, engine: &ProgressionEngine) {
        let area = frame.area();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(7),
                Constraint::Length(3),
            ])
            .split(area);

        // Header
        let header = Paragraph::new("GainEngine - Automated Progressive Overload")
            .style(Style::default().fg(Color::Cyan).bold())
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(header, chunks[0]);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(40), Constraint::Length(30)])
            .split(chunks[1]);

        let next = next_day_index(data);

        // Today's workout
        let (title, rows): (String, Vec<Row>) = match next.map(|i| &data.days[i]) {
            Some(day) => (
                format!("Today: {}", day.name),
                day.exercises
                    .iter()
                    .map(|ex| {
                        Row::new(vec![
                            Cell::from(ex.name.clone()),
                            Cell::from(ex.target_reps.clone()),
                            Cell::from(format_weight(ex.weight)),
                            Cell::from(format!(
                                "{}/{}",
                                engine.streak(ex),
                                engine.config().required_streak
                            )),
                        ])
                    })
                    .collect(),
            ),
            None => ("No workout days - add one with `gainengine add-day`".to_string(), Vec::new()),
        };

        let table = Table::new(
            rows,
            [
                Constraint::Min(20),
                Constraint::Length(8),
                Constraint::Length(9),
                Constraint::Length(7),
            ],
        )
        .header(Row::new(vec!["Exercise", "Reps", "Weight", "Streak"])
            .style(Style::default().bold()))
        .block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(table, body[0]);

        // Rotation
        let items: Vec<ListItem> = data
            .days
            .iter()
            .enumerate()
            .map(|(i, day)| {
                if Some(i) == next {
                    ListItem::new(format!("> {}", day.name))
                        .style(Style::default().fg(Color::Green).bold())
                } else {
                    ListItem::new(format!("  {}", day.name))
                }
            })
            .collect();
        let rotation = List::new(items)
            .block(Block::default().borders(Borders::ALL).title("Rotation"));
        frame.render_widget(rotation, body[1]);

        // Coach / status
        let text = self.tip.clone().unwrap_or_else(|| self.status.clone());
        let coach = Paragraph::new(text)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Coach"));
        frame.render_widget(coach, chunks[2]);

        // Footer
        let footer = Paragraph::new("q: quit | c: complete | n/p: next/prev day | t: tip | r: refresh")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(footer, chunks[3]);
    }

    async fn handle_events(&mut self) -> Result<()> {
        if event::poll(std::time::Duration::from_millis(100))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            match key.code {
                KeyCode::Char('q') => self.should_quit = true,
                KeyCode::Char('c') => self.complete().await,
                KeyCode::Char('n') => self.shift(1).await,
                KeyCode::Char('p') => self.shift(-1).await,
                KeyCode::Char('t') => self.coach_tip().await,
                KeyCode::Char('r') => {
                    self.tip = None;
                    self.status.clear();
                }
                _ => {}
            }
        }
        Ok(())
    }

    async fn complete(&mut self) {
        self.tip = None;
        self.status = match self.manager.complete_workout().await {
            Ok(Completion::NothingToComplete) => "Nothing to complete: the plan has no days".to_string(),
            Ok(Completion::Completed(done)) => completion_status(&done),
            Err(e) => match e.unsaved() {
                Some(Unsaved::Completed(done)) => {
                    format!("{}\nWarning: {}", completion_status(done), e)
                }
                _ => format!("Warning: {}", e),
            },
        };
    }

    /// Move the manual pointer by `delta` days
    async fn shift(&mut self, delta: i64) {
        let data = self.manager.snapshot();
        let Some(current) = next_day_index(&data) else {
            return;
        };
        let target = (current as i64 + delta).rem_euclid(data.days.len() as i64) as usize;
        if let Err(e) = self.manager.set_manual_index(target).await {
            self.status = format!("Warning: {}", e);
        }
    }

    async fn coach_tip(&mut self) {
        let data = self.manager.snapshot();
        if let Some(i) = next_day_index(&data) {
            self.tip = Some(self.coach.analyze(&data.days[i], self.language).await);
        }
    }
}

fn completion_status(done: &CompletedWorkout) -> String {
    let overloads: Vec<String> = done
        .overloads()
        .filter_map(|u| u.overload_message().map(|m| format!("{} {}", u.name, m)))
        .collect();
    if overloads.is_empty() {
        format!("Completed {}", done.day_name)
    } else {
        format!("Completed {}\n{}", done.day_name, overloads.join("\n"))
    }
}

fn init_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    Ok(terminal)
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}
