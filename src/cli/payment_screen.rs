//! Record-payment screen: payment-method splits on top, one allocation row per
//! unpaid charge below, then notes and a single message line.

use std::time::Instant;

use chrono::NaiveDate;
use crossterm::event::KeyCode;
use ratatui::{
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::error::LeaseDeskError;
use crate::fmt::{money, parse_amount};
use crate::models::{PaymentMethod, PaymentType};
use crate::payment_form::{AllocationField, DetailField, PaymentForm};
use crate::rpc::{LeaseApi, RpcTransport};
use crate::session::Session;
use crate::submission::{submit_payment, SUCCESS_CLOSE_DELAY};
use crate::tui::{
    allocation_chip, amount_input, edit_amount, edit_date, edit_text, field_line, message_lines,
    ScreenAction, BOLD, FOCUS_STYLE, FOOTER_STYLE, SELECTED_STYLE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Details,
    Date,
    Allocations,
    Notes,
}

const SECTIONS: &[Section] = &[Section::Details, Section::Date, Section::Allocations, Section::Notes];

fn cycle<E: Copy + PartialEq>(all: &[E], current: E, forward: bool) -> E {
    let pos = all.iter().position(|e| *e == current).unwrap_or(0);
    let next = if forward {
        (pos + 1) % all.len()
    } else {
        (pos + all.len() - 1) % all.len()
    };
    all[next]
}

pub struct PaymentScreen {
    form: PaymentForm,
    heading: String,
    section: Section,
    detail_row: usize,
    alloc_row: usize,
    /// Text of the amount being edited in the focused row.
    input: String,
    close_at: Option<Instant>,
}

impl PaymentScreen {
    /// Open for a lease and load its unpaid charges. A failed load leaves the
    /// screen usable with the error on its message line.
    pub fn open<T: RpcTransport>(api: &LeaseApi<T>, lease_id: i64, heading: &str, today: NaiveDate) -> Self {
        let mut form = PaymentForm::new(lease_id, today);
        match api.get_unpaid_charges_for_lease(lease_id) {
            Ok(charges) => {
                if charges.is_empty() {
                    form.set_error("This lease has no unpaid charges");
                }
                form.set_charges(charges);
            }
            Err(e) => form.set_error(LeaseDeskError::from(e).to_string()),
        }
        let mut screen = Self {
            form,
            heading: heading.to_string(),
            section: Section::Details,
            detail_row: 0,
            alloc_row: 0,
            input: String::new(),
            close_at: None,
        };
        screen.load_input();
        screen
    }

    fn load_input(&mut self) {
        self.input = match self.section {
            Section::Details => self
                .form
                .details()
                .get(self.detail_row)
                .map(|d| amount_input(d.amount))
                .unwrap_or_default(),
            Section::Allocations => self
                .form
                .allocations()
                .get(self.alloc_row)
                .map(|a| amount_input(a.amount))
                .unwrap_or_default(),
            Section::Date | Section::Notes => String::new(),
        };
    }

    fn focus(&mut self, section: Section) {
        self.section = section;
        self.load_input();
    }

    /// Called between keys. Closes the screen once a success message has been up long enough.
    pub fn tick(&mut self) -> ScreenAction {
        match self.close_at {
            Some(at) if Instant::now() >= at => ScreenAction::Close,
            _ => ScreenAction::Continue,
        }
    }

    pub fn handle_key<T: RpcTransport>(
        &mut self,
        code: KeyCode,
        api: &LeaseApi<T>,
        session: &Session,
        today: NaiveDate,
    ) -> ScreenAction {
        if self.close_at.is_some() {
            return ScreenAction::Close;
        }
        match code {
            KeyCode::Esc => return ScreenAction::Close,
            KeyCode::Tab => self.focus(cycle(SECTIONS, self.section, true)),
            KeyCode::BackTab => self.focus(cycle(SECTIONS, self.section, false)),
            KeyCode::Enter => self.submit(api, session, today),
            _ => match self.section {
                Section::Details => self.handle_detail_key(code),
                Section::Date => {
                    edit_date(&mut self.form.transaction_date, code);
                }
                Section::Allocations => self.handle_allocation_key(code),
                Section::Notes => {
                    edit_text(&mut self.form.notes, code);
                }
            },
        }
        ScreenAction::Continue
    }

    fn handle_detail_key(&mut self, code: KeyCode) {
        let current = self.form.details().get(self.detail_row).cloned();
        match code {
            KeyCode::Up => {
                self.detail_row = self.detail_row.saturating_sub(1);
                self.load_input();
            }
            KeyCode::Down => {
                let last = self.form.details().len().saturating_sub(1);
                self.detail_row = (self.detail_row + 1).min(last);
                self.load_input();
            }
            KeyCode::Char('+') => {
                self.form.add_detail();
                self.detail_row = self.form.details().len() - 1;
                self.load_input();
            }
            KeyCode::Char('-') => {
                if let Some(d) = current {
                    self.form.remove_detail(d.id);
                    self.detail_row = self.detail_row.min(self.form.details().len().saturating_sub(1));
                    self.load_input();
                }
            }
            KeyCode::Char('m') => {
                if let Some(d) = current {
                    let method = cycle(PaymentMethod::ALL, d.method, true);
                    self.form.update_detail(d.id, DetailField::Method(method));
                }
            }
            KeyCode::Char('t') => {
                if let Some(d) = current {
                    let kind = cycle(PaymentType::ALL, d.payment_type, true);
                    self.form.update_detail(d.id, DetailField::Type(kind));
                }
            }
            _ => {
                if let Some(d) = current {
                    if edit_amount(&mut self.input, code) {
                        let amount = parse_amount(&self.input).unwrap_or(0.0);
                        self.form.update_detail(d.id, DetailField::Amount(amount));
                    }
                }
            }
        }
    }

    fn handle_allocation_key(&mut self, code: KeyCode) {
        let current = self.form.allocations().get(self.alloc_row).cloned();
        match code {
            KeyCode::Up => {
                self.alloc_row = self.alloc_row.saturating_sub(1);
                self.load_input();
            }
            KeyCode::Down => {
                let last = self.form.allocations().len().saturating_sub(1);
                self.alloc_row = (self.alloc_row + 1).min(last);
                self.load_input();
            }
            KeyCode::Char(' ') => {
                if let Some(a) = current {
                    self.form.toggle_allocation(a.id);
                    self.load_input();
                }
            }
            KeyCode::Char('a') => {
                self.form.auto_allocate();
                self.load_input();
            }
            KeyCode::Char('x') => {
                self.form.clear_allocations();
                self.load_input();
            }
            _ => {
                if let Some(a) = current {
                    if edit_amount(&mut self.input, code) {
                        let typed = parse_amount(&self.input).unwrap_or(0.0);
                        let amount = self.form.set_allocation_amount(a.id, typed);
                        if amount < typed {
                            self.input = amount_input(amount);
                        }
                        if amount > 0.0 && !a.selected {
                            self.form.update_allocation(a.id, AllocationField::Selected(true));
                        }
                    }
                }
            }
        }
    }

    fn submit<T: RpcTransport>(&mut self, api: &LeaseApi<T>, session: &Session, today: NaiveDate) {
        if !self.form.can_submit() {
            if let Err(e) = self.form.validate() {
                self.form.set_error(e.to_string());
                return;
            }
        }
        let outcome = submit_payment(api, session, &mut self.form, today);
        if outcome.is_success() {
            self.close_at = Some(Instant::now() + SUCCESS_CLOSE_DELAY);
            self.detail_row = 0;
            self.alloc_row = 0;
        }
        self.load_input();
    }

    pub fn draw(&self, frame: &mut Frame) {
        let hints = match self.section {
            Section::Details => "Tab=section  Up/Down=row  0-9=amount  m=method  t=type  +/-=add/remove  Enter=record  Esc=close",
            Section::Date => "Tab=section  YYYY-MM-DD  Enter=record  Esc=close",
            Section::Allocations => "Tab=section  Up/Down=row  Space=toggle  0-9=amount  a=auto  x=clear  Enter=record  Esc=close",
            Section::Notes => "Tab=section  type notes  Enter=record  Esc=close",
        };
        let status = self.form.is_submitting().then_some("Recording payment...");
        let area = crate::tui::draw_chrome(frame, &format!("Record payment  {}", self.heading), hints, status);
        let width = area.width as usize;

        let mut lines = vec![Line::from(""), Line::from(Span::styled(" Payment methods", BOLD))];
        if self.form.details().is_empty() {
            lines.push(Line::from(Span::styled("   No payment methods. Press '+' to add one.", FOOTER_STYLE)));
        }
        for (i, d) in self.form.details().iter().enumerate() {
            let focused = self.section == Section::Details && i == self.detail_row;
            let amount = if focused { format!("${}_", self.input) } else { money(d.amount) };
            let style = if focused { SELECTED_STYLE } else { ratatui::style::Style::default() };
            lines.push(Line::from(Span::styled(
                format!(
                    " {} {:<14} {:<14} {}",
                    if focused { ">" } else { " " },
                    amount,
                    d.method,
                    d.payment_type
                ),
                style,
            )));
        }
        lines.push(Line::from(vec![
            Span::raw("   Total              "),
            Span::styled(format!("${}", self.form.total_amount()), BOLD),
        ]));
        lines.push(field_line(
            "Transaction date",
            &self.form.transaction_date,
            self.section == Section::Date,
        ));

        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(" Apply to charges (oldest first)", BOLD)));
        if self.form.allocations().is_empty() {
            lines.push(Line::from(Span::styled("   Nothing to allocate.", FOOTER_STYLE)));
        }
        for (i, a) in self.form.allocations().iter().enumerate() {
            let focused = self.section == Section::Allocations && i == self.alloc_row;
            let (category, due, balance) = match self.form.charge(a.charge_id) {
                Some(c) => (c.category.to_string(), c.due_date.to_string(), money(c.balance_remaining)),
                None => (String::new(), String::new(), String::new()),
            };
            let amount = if focused { format!("${}_", self.input) } else { money(a.amount) };
            lines.push(Line::from(Span::styled(
                format!(
                    " {} [{}] #{:<6} {:<12} due {}  balance {:<12} apply {}",
                    if focused { ">" } else { " " },
                    if a.selected { "x" } else { " " },
                    a.charge_id,
                    category,
                    due,
                    balance,
                    amount
                ),
                if focused {
                    SELECTED_STYLE
                } else if a.selected {
                    FOCUS_STYLE
                } else {
                    ratatui::style::Style::default()
                },
            )));
        }
        lines.push(allocation_chip(&self.form.summary()));

        lines.push(Line::from(""));
        lines.push(field_line("Notes", &self.form.notes, self.section == Section::Notes));

        lines.push(Line::from(""));
        if let Some(message) = &self.form.message {
            lines.extend(message_lines(message, width));
        } else if self.form.can_submit() {
            lines.push(Line::from(Span::styled("   Ready to record. Press Enter.", FOCUS_STYLE)));
        }

        frame.render_widget(Paragraph::new(lines), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment_form::MessageKind;
    use crate::rpc::fake::FakeTransport;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 2).unwrap()
    }

    fn api() -> LeaseApi<FakeTransport> {
        LeaseApi::new(
            FakeTransport::new()
                .respond(
                    "get_unpaid_charges_for_lease",
                    Ok(json!([
                        {"charge_id": 21, "category": "utilities", "total_due": 80.0, "amount_paid": 0.0,
                         "balance_remaining": 80.0, "due_date": "2025-04-15"},
                        {"charge_id": 20, "category": "rent", "total_due": 900.0, "amount_paid": 0.0,
                         "balance_remaining": 900.0, "due_date": "2025-04-01"}
                    ])),
                )
                .respond(
                    "record_and_allocate_payment",
                    Ok(json!([{"success": true, "message": "Payment recorded"}])),
                ),
        )
    }

    fn session() -> Session {
        let mut s = Session::new("Desk");
        s.assume_user("ops");
        s
    }

    fn press<T: RpcTransport>(screen: &mut PaymentScreen, api: &LeaseApi<T>, keys: &str) {
        let session = session();
        for c in keys.chars() {
            screen.handle_key(KeyCode::Char(c), api, &session, today());
        }
    }

    #[test]
    fn test_typing_amount_drives_total() {
        let api = api();
        let mut screen = PaymentScreen::open(&api, 3, "Lease #3", today());
        press(&mut screen, &api, "950");
        assert_eq!(screen.form.total_amount(), "950.00");
        assert_eq!(screen.form.charges()[0].charge_id, 20);
    }

    #[test]
    fn test_enter_without_allocation_shows_error_and_makes_no_call() {
        let api = api();
        let session = session();
        let mut screen = PaymentScreen::open(&api, 3, "Lease #3", today());
        press(&mut screen, &api, "100");
        screen.handle_key(KeyCode::Enter, &api, &session, today());
        let msg = screen.form.message.clone().unwrap();
        assert_eq!(msg.kind, MessageKind::Error);
        assert_eq!(msg.text, "Select at least one charge to apply this payment to");
        assert!(api.transport().calls_to("record_and_allocate_payment").is_empty());
        assert_eq!(screen.tick(), ScreenAction::Continue);
    }

    #[test]
    fn test_auto_allocate_then_record_closes_after_delay() {
        let api = api();
        let session = session();
        let mut screen = PaymentScreen::open(&api, 3, "Lease #3", today());
        press(&mut screen, &api, "950");
        screen.handle_key(KeyCode::Tab, &api, &session, today());
        screen.handle_key(KeyCode::Tab, &api, &session, today());
        press(&mut screen, &api, "a");
        assert!(screen.form.can_submit());

        screen.handle_key(KeyCode::Enter, &api, &session, today());
        let sent = &api.transport().calls_to("record_and_allocate_payment")[0];
        assert_eq!(
            sent["allocations"],
            json!([{"charge_id": 20, "amount": 900.0}, {"charge_id": 21, "amount": 50.0}])
        );
        assert_eq!(screen.form.message.as_ref().unwrap().kind, MessageKind::Success);
        assert!(screen.close_at.is_some());
        assert_eq!(
            screen.handle_key(KeyCode::Char('z'), &api, &session, today()),
            ScreenAction::Close
        );
    }

    #[test]
    fn test_split_rows_add_and_remove() {
        let api = api();
        let mut screen = PaymentScreen::open(&api, 3, "Lease #3", today());
        press(&mut screen, &api, "100+50m");
        assert_eq!(screen.form.details().len(), 2);
        assert_eq!(screen.form.details()[1].method, PaymentMethod::Check);
        assert_eq!(screen.form.total_amount(), "150.00");
        press(&mut screen, &api, "-");
        assert_eq!(screen.form.details().len(), 1);
        assert_eq!(screen.form.total_amount(), "100.00");
    }

    #[test]
    fn test_typing_allocation_amount_selects_row() {
        let api = api();
        let session = session();
        let mut screen = PaymentScreen::open(&api, 3, "Lease #3", today());
        press(&mut screen, &api, "80");
        screen.handle_key(KeyCode::Tab, &api, &session, today());
        screen.handle_key(KeyCode::Tab, &api, &session, today());
        screen.handle_key(KeyCode::Down, &api, &session, today());
        press(&mut screen, &api, "80");
        let row = &screen.form.allocations()[1];
        assert_eq!(row.charge_id, 21);
        assert!(row.selected);
        assert!(screen.form.summary().is_fully_allocated());
    }

    #[test]
    fn test_allocation_input_capped_at_charge_balance() {
        let api = api();
        let session = session();
        let mut screen = PaymentScreen::open(&api, 3, "Lease #3", today());
        press(&mut screen, &api, "500");
        screen.handle_key(KeyCode::Tab, &api, &session, today());
        screen.handle_key(KeyCode::Tab, &api, &session, today());
        screen.handle_key(KeyCode::Down, &api, &session, today());
        press(&mut screen, &api, "500");

        let row = &screen.form.allocations()[1];
        assert_eq!(row.charge_id, 21);
        assert!(row.selected);
        assert_eq!(row.amount, 80.0);
        assert_eq!(screen.input, "80.00");
        assert!(!screen.form.can_submit());

        screen.handle_key(KeyCode::Enter, &api, &session, today());
        assert!(api.transport().calls_to("record_and_allocate_payment").is_empty());
        assert_eq!(screen.form.message.as_ref().unwrap().kind, MessageKind::Error);
    }

    #[test]
    fn test_failed_charge_load_is_reported() {
        let api = LeaseApi::new(FakeTransport::new().respond(
            "get_unpaid_charges_for_lease",
            Err(crate::rpc::RpcError::Remote {
                procedure: "get_unpaid_charges_for_lease".into(),
                status: 404,
                message: "lease 3 not found".into(),
            }),
        ));
        let screen = PaymentScreen::open(&api, 3, "Lease #3", today());
        assert_eq!(
            screen.form.message.as_ref().unwrap().text,
            crate::remote_error::RemoteErrorKind::NotFound.to_string()
        );
    }
}
