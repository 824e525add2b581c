use crossterm::event::KeyCode;
use ratatui::{
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use zeroize::Zeroize;

use crate::models::UserType;
use crate::rpc::{LeaseApi, RpcTransport};
use crate::session::Session;
use crate::submission::SubmitOutcome;
use crate::tui::{draw_chrome, edit_text, field_line, ScreenAction, BOLD, FOCUS_STYLE, FOOTER_STYLE, WARN_STYLE};
use crate::users::{self, NewUserForm};

const NAME_IDX: usize = 0;
const PASSWORD_IDX: usize = 1;
const TYPE_IDX: usize = 2;

enum Screen {
    Locked,
    Menu,
    Add { focused: usize },
    Delete { confirming: bool },
}

/// Sub-user panel. Opens locked; the main account password unlocks it for the
/// lifetime of the screen.
pub struct UserManager {
    screen: Screen,
    account_password: String,
    form: NewUserForm,
    delete_name: String,
    status_message: Option<String>,
    /// Remaining keypresses before the status message is cleared.
    status_ttl: u8,
}

fn masked(secret: &str) -> String {
    "*".repeat(secret.chars().count())
}

impl UserManager {
    pub fn new() -> Self {
        Self {
            screen: Screen::Locked,
            account_password: String::new(),
            form: NewUserForm::new(),
            delete_name: String::new(),
            status_message: None,
            status_ttl: 0,
        }
    }

    fn set_status(&mut self, msg: String) {
        self.status_message = Some(msg);
        self.status_ttl = 3;
    }

    pub fn handle_key<T: RpcTransport>(&mut self, code: KeyCode, api: &LeaseApi<T>, session: &Session) -> ScreenAction {
        if self.status_ttl > 0 {
            self.status_ttl -= 1;
            if self.status_ttl == 0 {
                self.status_message = None;
            }
        }

        match self.screen {
            Screen::Locked => self.handle_locked_key(code, api),
            Screen::Menu => match code {
                KeyCode::Char('a') => {
                    self.form.clear();
                    self.screen = Screen::Add { focused: NAME_IDX };
                    ScreenAction::Continue
                }
                KeyCode::Char('d') => {
                    self.delete_name.clear();
                    self.screen = Screen::Delete { confirming: false };
                    ScreenAction::Continue
                }
                KeyCode::Char('q') | KeyCode::Esc => ScreenAction::Close,
                _ => ScreenAction::Continue,
            },
            Screen::Add { focused } => self.handle_add_key(code, focused, api, session),
            Screen::Delete { confirming } => self.handle_delete_key(code, confirming, api, session),
        }
    }

    fn handle_locked_key<T: RpcTransport>(&mut self, code: KeyCode, api: &LeaseApi<T>) -> ScreenAction {
        match code {
            KeyCode::Esc => return ScreenAction::Close,
            KeyCode::Enter => {
                let outcome = users::unlock_panel(api, &self.account_password);
                self.account_password.zeroize();
                if outcome.is_success() {
                    self.screen = Screen::Menu;
                    self.status_message = None;
                } else {
                    self.set_status(outcome.message());
                }
            }
            _ => {
                edit_text(&mut self.account_password, code);
            }
        }
        ScreenAction::Continue
    }

    fn handle_add_key<T: RpcTransport>(
        &mut self,
        code: KeyCode,
        focused: usize,
        api: &LeaseApi<T>,
        session: &Session,
    ) -> ScreenAction {
        match code {
            KeyCode::Esc => {
                self.form.clear();
                self.screen = Screen::Menu;
            }
            KeyCode::Tab | KeyCode::Down => {
                self.screen = Screen::Add {
                    focused: (focused + 1) % 3,
                }
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.screen = Screen::Add {
                    focused: (focused + 2) % 3,
                }
            }
            KeyCode::Left | KeyCode::Right if focused == TYPE_IDX => {
                let all = UserType::ALL;
                let pos = all.iter().position(|t| *t == self.form.user_type).unwrap_or(0);
                let next = if code == KeyCode::Right {
                    (pos + 1) % all.len()
                } else {
                    (pos + all.len() - 1) % all.len()
                };
                self.form.user_type = all[next];
            }
            KeyCode::Enter => {
                let outcome = users::add_user(api, session, &self.form);
                if let SubmitOutcome::Succeeded(msg) = &outcome {
                    self.set_status(msg.clone());
                    self.form.clear();
                    self.screen = Screen::Menu;
                } else {
                    self.set_status(outcome.message());
                }
            }
            _ => match focused {
                NAME_IDX => {
                    edit_text(&mut self.form.name, code);
                }
                PASSWORD_IDX => {
                    edit_text(&mut self.form.password, code);
                }
                _ => {}
            },
        }
        ScreenAction::Continue
    }

    fn handle_delete_key<T: RpcTransport>(
        &mut self,
        code: KeyCode,
        confirming: bool,
        api: &LeaseApi<T>,
        session: &Session,
    ) -> ScreenAction {
        if confirming {
            match code {
                KeyCode::Char('y') => {
                    let outcome = users::delete_user(api, session, &self.delete_name);
                    self.set_status(outcome.message());
                    self.delete_name.clear();
                    self.screen = Screen::Menu;
                }
                KeyCode::Char('n') | KeyCode::Esc => self.screen = Screen::Delete { confirming: false },
                _ => {}
            }
            return ScreenAction::Continue;
        }
        match code {
            KeyCode::Esc => self.screen = Screen::Menu,
            KeyCode::Enter => {
                if self.delete_name.trim().is_empty() {
                    self.set_status("User name is required".into());
                } else {
                    self.screen = Screen::Delete { confirming: true };
                }
            }
            _ => {
                edit_text(&mut self.delete_name, code);
            }
        }
        ScreenAction::Continue
    }

    pub fn draw(&self, frame: &mut Frame) {
        let hints = match self.screen {
            Screen::Locked => "Enter=unlock  Esc=back",
            Screen::Menu => "a=add user  d=delete user  Esc=back",
            Screen::Add { .. } => "Tab=next field  Left/Right=role  Enter=save  Esc=cancel",
            Screen::Delete { confirming: true } => "y=confirm  n=cancel",
            Screen::Delete { confirming: false } => "Enter=continue  Esc=cancel",
        };
        let area = draw_chrome(frame, "Users", hints, None);

        let mut lines = vec![
            Line::from(""),
            Line::from(Span::styled(" User management", BOLD)),
            Line::from(""),
        ];
        match self.screen {
            Screen::Locked => {
                lines.push(Line::from("   Enter the account password to manage users."));
                lines.push(Line::from(""));
                lines.push(field_line("Account password", &masked(&self.account_password), true));
            }
            Screen::Menu => {
                lines.push(Line::from("   a  Add a user"));
                lines.push(Line::from("   d  Delete a user"));
            }
            Screen::Add { focused } => {
                lines.push(field_line("Name", &self.form.name, focused == NAME_IDX));
                lines.push(field_line("Password", &masked(&self.form.password), focused == PASSWORD_IDX));
                let role_focused = focused == TYPE_IDX;
                let (l, r) = if role_focused { ("< ", " >") } else { ("  ", "  ") };
                lines.push(Line::from(vec![
                    Span::styled(
                        format!("   {:<18} ", "Role"),
                        if role_focused { BOLD } else { Style::default() },
                    ),
                    Span::styled(
                        format!("{l}{}{r}", self.form.user_type),
                        if role_focused { FOCUS_STYLE } else { Style::default() },
                    ),
                ]));
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    format!("   Passwords need at least {} characters.", users::MIN_PASSWORD_LEN),
                    FOOTER_STYLE,
                )));
            }
            Screen::Delete { confirming } => {
                lines.push(field_line("User name", &self.delete_name, !confirming));
                if confirming {
                    lines.push(Line::from(""));
                    lines.push(Line::from(Span::styled(
                        format!("   Delete '{}'? (y/n)", self.delete_name.trim()),
                        WARN_STYLE,
                    )));
                }
            }
        }

        if let Some(msg) = &self.status_message {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(format!("   {msg}"), WARN_STYLE)));
        }
        frame.render_widget(Paragraph::new(lines), area);
    }
}

impl Drop for UserManager {
    fn drop(&mut self) {
        self.account_password.zeroize();
    }
}
