use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use zeroize::Zeroize;

use crate::cli::form_screen::FormScreen;
use crate::cli::payment_screen::PaymentScreen;
use crate::cli::user_manager::UserManager;
use crate::cli::{prompt, today};
use crate::error::{LeaseDeskError, Result};
use crate::events::Subscription;
use crate::fmt::{date_or_dash, money};
use crate::models::{LeaseOverview, LeaseStatus};
use crate::remote_error::{classify, RemoteErrorKind};
use crate::rpc::{HttpTransport, LeaseApi};
use crate::session::Session;
use crate::settings::load_settings;
use crate::tui::{
    balance_span, draw_chrome, lease_status_style, payment_status_style, ScreenAction,
    AMOUNT_POS_STYLE, BOLD, FOOTER_STYLE, SELECTED_STYLE, WARN_STYLE,
};

const TICK: Duration = Duration::from_millis(250);
const LOGIN_ATTEMPTS: usize = 3;
const BOARD_HINTS: &str =
    "Up/Down=select  p=payment  c=charge  e=amend  t=terminate  n=new  u=users  r=refresh  q=quit";

/// What the board asks the dashboard to do after a key.
#[derive(Debug, PartialEq)]
enum BoardAction {
    None,
    Quit,
    Refresh,
    RecordPayment(LeaseOverview),
    AddCharge(LeaseOverview),
    Amend(LeaseOverview),
    Terminate(LeaseOverview),
    NewLease,
    Users,
}

/// Lease list plus the card for the selected lease.
struct Board {
    leases: Vec<LeaseOverview>,
    selection: usize,
    status_message: Option<String>,
    status_ttl: u8,
}

impl Board {
    fn new(leases: Vec<LeaseOverview>) -> Self {
        Self {
            leases,
            selection: 0,
            status_message: None,
            status_ttl: 0,
        }
    }

    fn selected(&self) -> Option<&LeaseOverview> {
        self.leases.get(self.selection)
    }

    /// Swap in fresh rows, keeping the same lease selected when it still exists.
    fn replace_leases(&mut self, leases: Vec<LeaseOverview>) {
        let current = self.selected().map(|l| l.lease_id);
        self.leases = leases;
        self.selection = current
            .and_then(|id| self.leases.iter().position(|l| l.lease_id == id))
            .unwrap_or_else(|| self.selection.min(self.leases.len().saturating_sub(1)));
    }

    fn set_status(&mut self, msg: String) {
        self.status_message = Some(msg);
        self.status_ttl = 3;
    }

    fn handle_key(&mut self, code: KeyCode) -> BoardAction {
        if self.status_ttl > 0 {
            self.status_ttl -= 1;
            if self.status_ttl == 0 {
                self.status_message = None;
            }
        }
        match code {
            KeyCode::Up => self.selection = self.selection.saturating_sub(1),
            KeyCode::Down => {
                if !self.leases.is_empty() {
                    self.selection = (self.selection + 1).min(self.leases.len() - 1);
                }
            }
            KeyCode::Home => self.selection = 0,
            KeyCode::End => self.selection = self.leases.len().saturating_sub(1),
            KeyCode::Char('q') | KeyCode::Esc => return BoardAction::Quit,
            KeyCode::Char('r') => return BoardAction::Refresh,
            KeyCode::Char('n') => return BoardAction::NewLease,
            KeyCode::Char('u') => return BoardAction::Users,
            KeyCode::Char(c @ ('p' | 'c' | 'e' | 't')) => {
                let Some(lease) = self.selected().cloned() else {
                    self.set_status("No lease selected".into());
                    return BoardAction::None;
                };
                if c != 'p' && lease.lease_status == LeaseStatus::Terminated {
                    self.set_status(format!("Lease #{} is terminated", lease.lease_id));
                    return BoardAction::None;
                }
                if c == 't' && !lease.is_open() {
                    self.set_status(format!("Lease #{} is {}", lease.lease_id, lease.lease_status));
                    return BoardAction::None;
                }
                return match c {
                    'p' => BoardAction::RecordPayment(lease),
                    'c' => BoardAction::AddCharge(lease),
                    'e' => BoardAction::Amend(lease),
                    _ => BoardAction::Terminate(lease),
                };
            }
            _ => {}
        }
        BoardAction::None
    }

    fn draw(&self, frame: &mut Frame, title: &str) {
        let area = draw_chrome(frame, title, BOARD_HINTS, self.status_message.as_deref());
        let [list_area, card_area] =
            Layout::horizontal([Constraint::Percentage(62), Constraint::Percentage(38)]).areas(area);
        self.draw_list(frame, list_area);
        self.draw_card(frame, card_area);
    }

    fn draw_list(&self, frame: &mut Frame, area: Rect) {
        let mut lines = vec![
            Line::from(""),
            Line::from(Span::styled(format!(" Leases ({})", self.leases.len()), BOLD)),
            Line::from(""),
        ];
        if self.leases.is_empty() {
            lines.push(Line::from("   No leases yet. Press 'n' to create one."));
            frame.render_widget(Paragraph::new(lines), area);
            return;
        }

        lines.push(Line::from(Span::styled(
            format!(
                "   {:<6} {:<18} {:<18} {:<11} {:<8} {:>12}",
                "ID", "Asset", "Renter", "Status", "Payment", "Balance"
            ),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::BOLD),
        )));

        let visible = area.height.saturating_sub(lines.len() as u16).max(1) as usize;
        let offset = self.selection.saturating_sub(visible - 1);
        for (i, lease) in self.leases.iter().enumerate().skip(offset).take(visible) {
            let selected = i == self.selection;
            let row_style = if selected { SELECTED_STYLE } else { Style::default() };
            let marker = if selected { " > " } else { "   " };
            lines.push(Line::from(vec![
                Span::styled(
                    format!(
                        "{marker}{:<6} {:<18} {:<18} ",
                        lease.lease_id,
                        truncate(&lease.asset_name, 18),
                        truncate(&lease.renter_name, 18)
                    ),
                    row_style,
                ),
                Span::styled(
                    format!("{:<11} ", lease.lease_status),
                    row_style.patch(lease_status_style(lease.lease_status)),
                ),
                Span::styled(
                    format!("{:<8} ", lease.payment_status),
                    row_style.patch(payment_status_style(lease.payment_status)),
                ),
                Span::styled(format!("{:>12}", money(lease.total_balance)), row_style),
            ]));
        }
        frame.render_widget(Paragraph::new(lines), area);
    }

    fn draw_card(&self, frame: &mut Frame, area: Rect) {
        let Some(lease) = self.selected() else {
            return;
        };
        let mut lines = vec![
            Line::from(""),
            Line::from(Span::styled(format!(" Lease #{}", lease.lease_id), BOLD)),
            Line::from(""),
            Line::from(format!(" Asset      {}", lease.asset_name)),
            Line::from(format!(" Renter     {}", lease.renter_name)),
            Line::from(format!(
                " Period     {} to {}",
                lease.start_date,
                date_or_dash(lease.end_date)
            )),
            Line::from(vec![
                Span::raw(" Status     "),
                Span::styled(lease.lease_status.to_string(), lease_status_style(lease.lease_status)),
                Span::raw(" / "),
                Span::styled(
                    lease.payment_status.to_string(),
                    payment_status_style(lease.payment_status),
                ),
            ]),
            Line::from(format!(
                " Base       {} {}",
                money(lease.base_charge_amount),
                lease.charge_frequency
            )),
            Line::from(vec![Span::raw(" Balance    "), balance_span(lease.total_balance)]),
            Line::from(vec![Span::raw(" Overdue    "), balance_span(lease.overdue_balance)]),
            Line::from(""),
            Line::from(Span::styled(" Charge intervals", BOLD)),
        ];
        if lease.charge_intervals.is_empty() {
            lines.push(Line::from(Span::styled("   none", FOOTER_STYLE)));
        }
        for interval in &lease.charge_intervals {
            lines.push(Line::from(vec![
                Span::raw(format!(
                    "   {} to {}  {:>11}  ",
                    interval.start_date,
                    interval.end_date,
                    money(interval.amount)
                )),
                if interval.is_paid {
                    Span::styled("paid", AMOUNT_POS_STYLE)
                } else {
                    Span::styled("unpaid", WARN_STYLE)
                },
            ]));
        }
        frame.render_widget(Paragraph::new(lines), area);
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let cut: String = s.chars().take(width.saturating_sub(1)).collect();
        format!("{cut}\u{2026}")
    }
}

enum DashboardScreen {
    Board,
    Payment(PaymentScreen),
    Form(FormScreen),
    Users(UserManager),
}

type RefreshResult = std::result::Result<Vec<LeaseOverview>, RemoteErrorKind>;

/// At most one overview fetch in flight. A request that arrives while one is
/// running is remembered and answered with exactly one more fetch, since the
/// running one may have read the data before the change.
#[derive(Debug, Default)]
struct RefreshState {
    running: bool,
    pending: bool,
}

impl RefreshState {
    /// Returns true when the caller should start a fetch now.
    fn request(&mut self) -> bool {
        if self.running {
            self.pending = true;
            false
        } else {
            self.running = true;
            true
        }
    }

    /// A fetch landed. Returns true when a queued request needs a new fetch.
    fn finished(&mut self) -> bool {
        self.running = false;
        if std::mem::take(&mut self.pending) {
            self.running = true;
            true
        } else {
            false
        }
    }
}

struct Dashboard {
    api: Arc<LeaseApi<HttpTransport>>,
    session: Session,
    board: Board,
    screen: DashboardScreen,
    title: String,
    changes: Subscription,
    refresh_tx: Sender<RefreshResult>,
    refresh_rx: Receiver<RefreshResult>,
    refresh: RefreshState,
}

impl Dashboard {
    fn new(api: Arc<LeaseApi<HttpTransport>>, session: Session, leases: Vec<LeaseOverview>) -> Self {
        let title = match session.current_user() {
            Some(u) => match u.user_type {
                Some(t) => format!("signed in as {} ({t})", u.name),
                None => format!("signed in as {}", u.name),
            },
            None => String::new(),
        };
        let changes = session.bus().subscribe();
        let (refresh_tx, refresh_rx) = unbounded();
        Self {
            api,
            session,
            board: Board::new(leases),
            screen: DashboardScreen::Board,
            title,
            changes,
            refresh_tx,
            refresh_rx,
            refresh: RefreshState::default(),
        }
    }

    fn request_refresh(&mut self) {
        if self.refresh.request() {
            self.spawn_fetch();
        }
    }

    /// Re-fetch the overview on a worker thread. The board keeps showing the
    /// old rows until the answer lands.
    fn spawn_fetch(&self) {
        let api = Arc::clone(&self.api);
        let tx = self.refresh_tx.clone();
        std::thread::spawn(move || {
            let result = api.get_leases_overview().map_err(|e| classify(&e));
            let _ = tx.send(result);
        });
    }

    fn poll_background(&mut self) {
        if !self.changes.drain().is_empty() {
            self.request_refresh();
        }
        while let Ok(result) = self.refresh_rx.try_recv() {
            match result {
                Ok(leases) => self.board.replace_leases(leases),
                Err(kind) => tracing::warn!(error = %kind, "lease refresh failed"),
            }
            if self.refresh.finished() {
                self.spawn_fetch();
            }
        }
    }

    fn tick(&mut self) {
        let closed = match &mut self.screen {
            DashboardScreen::Payment(s) => s.tick() == ScreenAction::Close,
            DashboardScreen::Form(s) => s.tick() == ScreenAction::Close,
            DashboardScreen::Board | DashboardScreen::Users(_) => false,
        };
        if closed {
            self.screen = DashboardScreen::Board;
        }
    }

    fn draw(&self, frame: &mut Frame) {
        match &self.screen {
            DashboardScreen::Board => self.board.draw(frame, &self.title),
            DashboardScreen::Payment(s) => s.draw(frame),
            DashboardScreen::Form(s) => s.draw(frame),
            DashboardScreen::Users(s) => s.draw(frame),
        }
    }

    /// Returns true when the dashboard should exit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        if matches!(self.screen, DashboardScreen::Board) {
            return self.handle_board_key(code);
        }
        let api = self.api.as_ref();
        let closed = match &mut self.screen {
            DashboardScreen::Board => ScreenAction::Continue,
            DashboardScreen::Payment(s) => s.handle_key(code, api, &self.session, today()),
            DashboardScreen::Form(s) => s.handle_key(code, api, &self.session),
            DashboardScreen::Users(s) => s.handle_key(code, api, &self.session),
        } == ScreenAction::Close;
        if closed {
            self.screen = DashboardScreen::Board;
        }
        false
    }

    fn handle_board_key(&mut self, code: KeyCode) -> bool {
        let action = self.board.handle_key(code);
        let editing = matches!(
            action,
            BoardAction::RecordPayment(_)
                | BoardAction::AddCharge(_)
                | BoardAction::Amend(_)
                | BoardAction::Terminate(_)
                | BoardAction::NewLease
        );
        if editing {
            if let Err(e) = self.session.require_editor() {
                self.board.set_status(e.to_string());
                return false;
            }
        }
        match action {
            BoardAction::None => {}
            BoardAction::Quit => return true,
            BoardAction::Refresh => self.request_refresh(),
            BoardAction::RecordPayment(lease) => {
                let heading = format!(
                    "Lease #{}  {} / {}",
                    lease.lease_id, lease.asset_name, lease.renter_name
                );
                self.screen = DashboardScreen::Payment(PaymentScreen::open(
                    self.api.as_ref(),
                    lease.lease_id,
                    &heading,
                    today(),
                ));
            }
            BoardAction::AddCharge(lease) => {
                self.screen = DashboardScreen::Form(FormScreen::add_charge(&lease, today()))
            }
            BoardAction::Amend(lease) => self.screen = DashboardScreen::Form(FormScreen::amend_lease(&lease)),
            BoardAction::Terminate(lease) => {
                self.screen = DashboardScreen::Form(FormScreen::terminate_lease(&lease, today()))
            }
            BoardAction::NewLease => self.screen = DashboardScreen::Form(FormScreen::create_lease(today())),
            BoardAction::Users => {
                if self.session.can_manage_users() {
                    self.screen = DashboardScreen::Users(UserManager::new());
                } else {
                    self.board.set_status("Only administrators can manage users".into());
                }
            }
        }
        false
    }
}

// ---------------------------------------------------------------------------
// Terminal-mode sign in
// ---------------------------------------------------------------------------

fn sign_in(api: &LeaseApi<HttpTransport>, session: &mut Session, user: Option<&str>) -> Result<()> {
    let name = match user {
        Some(n) => n.to_string(),
        None => prompt("User name: ")?,
    };
    for attempt in 1..=LOGIN_ATTEMPTS {
        let mut password = rpassword::prompt_password(format!("Password for {name}: "))?;
        let result = session.login(api, &name, &password).map(|_| ());
        password.zeroize();
        match result {
            Ok(()) => return Ok(()),
            Err(LeaseDeskError::Rejected(msg)) if attempt < LOGIN_ATTEMPTS => eprintln!("{msg}"),
            Err(e) => return Err(e),
        }
    }
    Err(LeaseDeskError::Rejected("Too many failed sign-in attempts".into()))
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

pub fn run(user: Option<&str>) -> Result<()> {
    let settings = load_settings();
    let api = Arc::new(settings.api()?);
    let mut session = Session::new(&settings.manager_name);
    sign_in(&api, &mut session, user)?;

    let leases = api.get_leases_overview()?;
    let mut dashboard = Dashboard::new(api, session, leases);

    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        ratatui::restore();
        hook(info);
    }));

    let mut terminal = ratatui::init();

    let result: Result<()> = loop {
        if let Err(e) = terminal.draw(|frame| dashboard.draw(frame)) {
            break Err(e.into());
        }

        dashboard.poll_background();

        match event::poll(TICK) {
            Ok(true) => {}
            Ok(false) => {
                dashboard.tick();
                continue;
            }
            Err(e) => break Err(e.into()),
        }

        match event::read() {
            Err(e) => break Err(e.into()),
            Ok(Event::Key(key)) => {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
                    break Ok(());
                }
                if dashboard.handle_key(key.code) {
                    break Ok(());
                }
            }
            _ => {}
        }
    };

    drop(terminal);
    ratatui::restore();
    dashboard.session.logout();
    result
}
