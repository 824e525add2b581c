use std::time::Instant;

use chrono::NaiveDate;
use crossterm::event::KeyCode;
use ratatui::{
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::fmt::{date_or_dash, money};
use crate::lease_forms::{self, AmendLeaseForm, ChargeForm, CreateLeaseForm, TerminateLeaseForm};
use crate::models::{ChargeCategory, ChargeFrequency, LeaseOverview};
use crate::payment_form::{FormMessage, MessageKind};
use crate::rpc::{LeaseApi, RpcTransport};
use crate::session::Session;
use crate::submission::{SubmitOutcome, SUCCESS_CLOSE_DELAY};
use crate::tui::{
    draw_chrome, edit_amount, edit_date, edit_text, message_lines, ScreenAction, BOLD, FOCUS_STYLE,
    FOOTER_STYLE,
};

enum FieldKind {
    Text,
    Amount,
    Date,
    Selector { options: Vec<&'static str>, selected: usize },
}

struct FormField {
    label: &'static str,
    value: String,
    kind: FieldKind,
}

impl FormField {
    fn text(label: &'static str, value: &str) -> Self {
        Self {
            label,
            value: value.to_string(),
            kind: FieldKind::Text,
        }
    }

    fn amount(label: &'static str) -> Self {
        Self {
            label,
            value: String::new(),
            kind: FieldKind::Amount,
        }
    }

    fn date(label: &'static str, value: &str) -> Self {
        Self {
            label,
            value: value.to_string(),
            kind: FieldKind::Date,
        }
    }

    fn selector(label: &'static str, options: Vec<&'static str>) -> Self {
        Self {
            label,
            value: options.first().copied().unwrap_or_default().to_string(),
            kind: FieldKind::Selector { options, selected: 0 },
        }
    }
}

enum FormKind {
    Create,
    Amend(AmendLeaseForm),
    Terminate(TerminateLeaseForm),
    Charge(ChargeForm),
}

/// Create / amend / terminate / add-charge dialog. Closes itself a moment after
/// a successful submit.
pub struct FormScreen {
    kind: FormKind,
    title: String,
    context: Vec<String>,
    fields: Vec<FormField>,
    focused: usize,
    message: Option<FormMessage>,
    close_at: Option<Instant>,
}

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn lease_context(lease: &LeaseOverview) -> Vec<String> {
    vec![
        format!("{} / {}", lease.asset_name, lease.renter_name),
        format!("{} to {}", lease.start_date, date_or_dash(lease.end_date)),
        format!("Base {} {}", money(lease.base_charge_amount), lease.charge_frequency),
    ]
}

impl FormScreen {
    fn build(kind: FormKind, title: String, context: Vec<String>, fields: Vec<FormField>) -> Self {
        Self {
            kind,
            title,
            context,
            fields,
            focused: 0,
            message: None,
            close_at: None,
        }
    }

    pub fn create_lease(today: NaiveDate) -> Self {
        Self::build(
            FormKind::Create,
            "New lease".into(),
            vec![],
            vec![
                FormField::text("Asset ID", ""),
                FormField::text("Renter ID", ""),
                FormField::date("Start date", &iso(today)),
                FormField::date("End date", ""),
                FormField::amount("Base charge"),
                FormField::selector("Frequency", ChargeFrequency::ALL.iter().map(|f| f.as_str()).collect()),
            ],
        )
    }

    pub fn amend_lease(lease: &LeaseOverview) -> Self {
        Self::build(
            FormKind::Amend(AmendLeaseForm::for_lease(lease)),
            format!("Amend lease #{}", lease.lease_id),
            lease_context(lease),
            vec![FormField::date("New end date", ""), FormField::amount("New base charge")],
        )
    }

    pub fn terminate_lease(lease: &LeaseOverview, today: NaiveDate) -> Self {
        let form = TerminateLeaseForm::for_lease(lease, today);
        let fields = vec![
            FormField::date("Termination date", &form.termination_date),
            FormField::text("Reason", ""),
        ];
        Self::build(
            FormKind::Terminate(form),
            format!("Terminate lease #{}", lease.lease_id),
            lease_context(lease),
            fields,
        )
    }

    pub fn add_charge(lease: &LeaseOverview, today: NaiveDate) -> Self {
        let form = ChargeForm::new(lease.lease_id, today);
        let fields = vec![
            FormField::amount("Amount"),
            FormField::selector("Category", ChargeCategory::ALL.iter().map(|c| c.as_str()).collect()),
            FormField::date("Due date", &form.due_date),
            FormField::text("Description", ""),
        ];
        Self::build(
            FormKind::Charge(form),
            format!("Add charge to lease #{}", lease.lease_id),
            lease_context(lease),
            fields,
        )
    }

    pub fn tick(&mut self) -> ScreenAction {
        match self.close_at {
            Some(at) if Instant::now() >= at => ScreenAction::Close,
            _ => ScreenAction::Continue,
        }
    }

    pub fn handle_key<T: RpcTransport>(&mut self, code: KeyCode, api: &LeaseApi<T>, session: &Session) -> ScreenAction {
        if self.close_at.is_some() {
            return ScreenAction::Close;
        }
        let count = self.fields.len();
        match code {
            KeyCode::Esc => return ScreenAction::Close,
            KeyCode::Tab | KeyCode::Down => self.focused = (self.focused + 1) % count,
            KeyCode::BackTab | KeyCode::Up => self.focused = (self.focused + count - 1) % count,
            KeyCode::Enter => self.submit(api, session),
            KeyCode::Left | KeyCode::Right => {
                let field = &mut self.fields[self.focused];
                if let FieldKind::Selector { options, selected } = &mut field.kind {
                    *selected = if code == KeyCode::Right {
                        (*selected + 1) % options.len()
                    } else {
                        (*selected + options.len() - 1) % options.len()
                    };
                    field.value = options[*selected].to_string();
                }
            }
            _ => {
                let field = &mut self.fields[self.focused];
                match field.kind {
                    FieldKind::Text => {
                        edit_text(&mut field.value, code);
                    }
                    FieldKind::Amount => {
                        edit_amount(&mut field.value, code);
                    }
                    FieldKind::Date => {
                        edit_date(&mut field.value, code);
                    }
                    FieldKind::Selector { .. } => {}
                }
            }
        }
        ScreenAction::Continue
    }

    fn submit<T: RpcTransport>(&mut self, api: &LeaseApi<T>, session: &Session) {
        let outcome = match &mut self.kind {
            FormKind::Create => {
                let form = CreateLeaseForm {
                    asset_id: self.fields[0].value.clone(),
                    renter_id: self.fields[1].value.clone(),
                    start_date: self.fields[2].value.clone(),
                    end_date: self.fields[3].value.clone(),
                    base_charge_amount: self.fields[4].value.clone(),
                    charge_frequency: ChargeFrequency::parse(&self.fields[5].value),
                };
                lease_forms::submit_create(api, session, &form)
            }
            FormKind::Amend(form) => {
                form.new_end_date = self.fields[0].value.clone();
                form.new_base_charge_amount = self.fields[1].value.clone();
                lease_forms::submit_amend(api, session, form)
            }
            FormKind::Terminate(form) => {
                form.termination_date = self.fields[0].value.clone();
                form.reason = self.fields[1].value.clone();
                lease_forms::submit_terminate(api, session, form)
            }
            FormKind::Charge(form) => {
                form.amount = self.fields[0].value.clone();
                form.category = ChargeCategory::parse(&self.fields[1].value).unwrap_or(ChargeCategory::Rent);
                form.due_date = self.fields[2].value.clone();
                form.description = self.fields[3].value.clone();
                lease_forms::submit_charge(api, session, form)
            }
        };
        self.show(outcome);
    }

    fn show(&mut self, outcome: SubmitOutcome) {
        let kind = if outcome.is_success() {
            self.close_at = Some(Instant::now() + SUCCESS_CLOSE_DELAY);
            MessageKind::Success
        } else {
            MessageKind::Error
        };
        self.message = Some(FormMessage {
            kind,
            text: outcome.message(),
        });
    }

    pub fn draw(&self, frame: &mut Frame) {
        let area = draw_chrome(
            frame,
            &self.title,
            "Tab=next field  Left/Right=choose  Enter=save  Esc=cancel",
            None,
        );

        let mut lines = vec![Line::from(""), Line::from(Span::styled(format!(" {}", self.title), BOLD))];
        for c in &self.context {
            lines.push(Line::from(Span::styled(format!("   {c}"), FOOTER_STYLE)));
        }
        lines.push(Line::from(""));

        for (i, field) in self.fields.iter().enumerate() {
            let focused = i == self.focused;
            let label_style = if focused { BOLD } else { Style::default() };
            let value_style = if focused { FOCUS_STYLE } else { Style::default() };
            let shown = match &field.kind {
                FieldKind::Selector { options, selected } => {
                    let (l, r) = if focused { ("< ", " >") } else { ("  ", "  ") };
                    format!("{l}{}{r}", options[*selected])
                }
                FieldKind::Amount if field.value.is_empty() && !focused => "$0.00".to_string(),
                FieldKind::Amount => format!("${}{}", field.value, if focused { "_" } else { "" }),
                _ => format!("{}{}", field.value, if focused { "_" } else { "" }),
            };
            lines.push(Line::from(vec![
                Span::styled(format!("   {:<18} ", field.label), label_style),
                Span::styled(shown, value_style),
            ]));
        }

        if let Some(message) = &self.message {
            lines.push(Line::from(""));
            lines.extend(message_lines(message, area.width as usize));
        }
        frame.render_widget(Paragraph::new(lines), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LeaseStatus, PaymentStatus};
    use crate::rpc::fake::FakeTransport;
    use serde_json::json;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, day).unwrap()
    }

    fn lease() -> LeaseOverview {
        LeaseOverview {
            lease_id: 4,
            asset_id: 1,
            asset_name: "Bay 4".into(),
            renter_id: 9,
            renter_name: "Acme Storage".into(),
            start_date: d(1, 1),
            end_date: None,
            lease_status: LeaseStatus::Active,
            payment_status: PaymentStatus::Current,
            base_charge_amount: 400.0,
            charge_frequency: ChargeFrequency::Monthly,
            total_balance: 0.0,
            overdue_balance: 0.0,
            charge_intervals: vec![],
        }
    }

    fn session() -> Session {
        let mut s = Session::new("");
        s.assume_user("ops");
        s
    }

    fn type_str<T: RpcTransport>(screen: &mut FormScreen, api: &LeaseApi<T>, s: &str) {
        let session = session();
        for c in s.chars() {
            screen.handle_key(KeyCode::Char(c), api, &session);
        }
    }

    #[test]
    fn test_charge_form_submits_selected_category() {
        let api = LeaseApi::new(FakeTransport::new().respond(
            "generate_charge",
            Ok(json!([{"success": true, "message": "Charge added", "charge_id": 5}])),
        ));
        let session = session();
        let mut screen = FormScreen::add_charge(&lease(), d(6, 1));
        type_str(&mut screen, &api, "75.5");
        screen.handle_key(KeyCode::Tab, &api, &session);
        screen.handle_key(KeyCode::Right, &api, &session);
        screen.handle_key(KeyCode::Enter, &api, &session);

        let sent = &api.transport().calls_to("generate_charge")[0];
        assert_eq!(sent["amount"], json!(75.5));
        assert_eq!(sent["category"], json!("utilities"));
        assert_eq!(sent["due_date"], json!("2025-06-01"));
        assert_eq!(screen.message.as_ref().unwrap().text, "Charge added");
        assert!(screen.close_at.is_some());
    }

    #[test]
    fn test_amend_without_changes_stays_open() {
        let api = LeaseApi::new(FakeTransport::new());
        let session = session();
        let mut screen = FormScreen::amend_lease(&lease());
        screen.handle_key(KeyCode::Enter, &api, &session);
        let msg = screen.message.as_ref().unwrap();
        assert_eq!(msg.kind, MessageKind::Error);
        assert_eq!(msg.text, "Enter a new end date or a new base charge amount");
        assert!(screen.close_at.is_none());
        assert_eq!(screen.tick(), ScreenAction::Continue);
        assert!(api.transport().calls().is_empty());
    }

    #[test]
    fn test_terminate_prefills_today() {
        let screen = FormScreen::terminate_lease(&lease(), d(3, 9));
        assert_eq!(screen.fields[0].value, "2025-03-09");
    }

    #[test]
    fn test_escape_closes() {
        let api = LeaseApi::new(FakeTransport::new());
        let mut screen = FormScreen::create_lease(d(1, 1));
        assert_eq!(screen.handle_key(KeyCode::Esc, &api, &session()), ScreenAction::Close);
    }
}
