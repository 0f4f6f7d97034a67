//! Line-driven stand-in for the text area and its search popup.
//!
//! Each stdin line is either the new content of the search box or a
//! `:command`. The session owns the pager and drains its events in the same
//! loop that reads input, so the pager is only ever touched from one task.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use ghmacros_protocol::AddMacroResponse;
use ghmacros_protocol::CLIENT_VERSION;
use ghmacros_protocol::ErrorCode;
use ghmacros_protocol::MacroItem;
use ghmacros_protocol::SystemMessage;
use ghmacros_protocol::UsageTrigger;
use ghmacros_search::CatalogError;
use ghmacros_search::KeyValueStore;
use ghmacros_search::MacroCatalog;
use ghmacros_search::MacroPager;
use ghmacros_search::NameLookup;
use ghmacros_search::PagerEvent;
use ghmacros_search::PagerNotice;
use ghmacros_search::ScrollMetrics;
use ghmacros_search::TopUsages;
use ghmacros_search::expansion::POPUP_TRIGGER_DELAY;
use ghmacros_search::expansion::expand_pattern;
use ghmacros_search::expansion::insert_selected_macro;
use ghmacros_search::expansion::is_popup_trigger;
use ghmacros_search::expansion::pattern_name_before_cursor;
use ghmacros_search::persist::apply_version_gate;
use ghmacros_search::persist::save_suggestions_snapshot;
use ghmacros_search::system_message;
use ghmacros_search::validate::Validation;
use ghmacros_search::validate::validate_new_macro;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::unbounded_channel;
use tokio::task::JoinHandle;

use crate::config::MacrosConfig;
use crate::render::TextSink;

const HELP: &str = "\
type a line to search (empty line shows suggestions)
:more          load the next page
:pick N        insert the Nth listed macro into the draft
:type TEXT     append TEXT to the draft (`!` opens the popup, `$name$` expands)
:report N      report the Nth listed macro as broken
:add NAME URL  add a new macro to the catalog
:close         close the popup
:quit          exit";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Search(String),
    More,
    Pick(usize),
    Type(String),
    Report(usize),
    Add { name: String, url: String },
    Close,
    Help,
    Quit,
    Unknown(String),
}

fn parse_command(line: &str) -> Command {
    let Some(rest) = line.strip_prefix(':') else {
        return Command::Search(line.trim().to_string());
    };
    let (name, arg) = rest.split_once(' ').unwrap_or((rest, ""));
    let index = || arg.trim().parse::<usize>().ok().filter(|n| *n > 0);
    match name {
        "more" => Command::More,
        "pick" => index().map_or_else(|| Command::Unknown(line.to_string()), Command::Pick),
        "report" => index().map_or_else(|| Command::Unknown(line.to_string()), Command::Report),
        "type" => Command::Type(arg.to_string()),
        "add" => {
            let mut parts = arg.split_whitespace();
            match (parts.next(), parts.next(), parts.next()) {
                (Some(name), Some(url), None) => Command::Add {
                    name: name.to_string(),
                    url: url.to_string(),
                },
                _ => Command::Unknown(line.to_string()),
            }
        }
        "close" => Command::Close,
        "help" => Command::Help,
        "quit" | "q" => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    }
}

/// Completions of work the session starts itself, delivered through the
/// same loop as pager events.
#[derive(Debug)]
pub enum SessionEvent {
    PopupTriggerElapsed {
        generation: u64,
    },
    MacroAdded {
        name: String,
        url: String,
        result: Result<AddMacroResponse, CatalogError>,
    },
}

pub struct SessionEvents {
    pub pager: UnboundedReceiver<PagerEvent>,
    pub session: UnboundedReceiver<SessionEvent>,
}

struct PopupTrigger {
    generation: u64,
    handle: JoinHandle<()>,
}

pub struct Session<C: MacroCatalog, K: KeyValueStore> {
    catalog: Arc<C>,
    pager: MacroPager<C, TextSink>,
    store: K,
    top_usages: TopUsages,
    event_tx: UnboundedSender<SessionEvent>,
    /// Text area content; the cursor is always at its end.
    draft: String,
    /// A typed `!` waiting out the popup delay.
    popup_trigger: Option<PopupTrigger>,
    trigger_generation: u64,
    /// `$name$` pattern waiting for an exact lookup.
    awaiting_name: Option<String>,
}

impl<C: MacroCatalog, K: KeyValueStore> Session<C, K> {
    /// Apply the version gate, load usage ranking and restore the previous
    /// session's suggestions.
    pub fn start(
        catalog: Arc<C>,
        mut store: K,
        config: &MacrosConfig,
    ) -> (Self, SessionEvents) {
        match apply_version_gate(&mut store, CLIENT_VERSION) {
            Ok(gate) => tracing::debug!("version gate: {gate:?}"),
            Err(err) => tracing::warn!("failed to record client version: {err}"),
        }
        let top_usages = TopUsages::load(&store);

        let (pager_tx, pager_rx) = unbounded_channel();
        let mut pager = MacroPager::new(
            Arc::clone(&catalog),
            TextSink::default(),
            pager_tx,
            config.pager_config(),
        );
        pager.restore_from_store(&store, &top_usages, Utc::now(), config.suggestions_freshness);

        let (event_tx, event_rx) = unbounded_channel();
        let session = Self {
            catalog,
            pager,
            store,
            top_usages,
            event_tx,
            draft: String::new(),
            popup_trigger: None,
            trigger_generation: 0,
            awaiting_name: None,
        };
        let events = SessionEvents {
            pager: pager_rx,
            session: event_rx,
        };
        (session, events)
    }

    pub fn open_popup(&mut self) {
        self.pager.open_suggestions();
    }

    /// Returns `false` when the session should end.
    fn handle_line(&mut self, line: &str) -> bool {
        match parse_command(line) {
            Command::Search(query) if query.is_empty() => self.open_popup(),
            Command::Search(query) => self.pager.debounced_search(&query),
            Command::More => {
                if !self.pager.on_scroll(ScrollMetrics::at_end(0.0)) {
                    self.note("nothing more to load");
                }
            }
            Command::Pick(n) => match self.listed(n) {
                Some(item) => self.select(&item),
                None => self.note(format!("no item {n}")),
            },
            Command::Type(text) => self.type_text(&text),
            Command::Report(n) => match self.listed(n) {
                Some(item) => {
                    self.report_broken(item.name.clone());
                    self.note(format!("reported {}", item.name));
                }
                None => self.note(format!("no item {n}")),
            },
            Command::Add { name, url } => self.add_macro(name, url),
            Command::Close => self.close_popup(),
            Command::Help => self.note(HELP),
            Command::Quit => return false,
            Command::Unknown(line) => self.note(format!("unknown command {line:?}; :help lists commands")),
        }
        true
    }

    fn handle_event(&mut self, event: PagerEvent) {
        for notice in self.pager.handle_event(event) {
            match notice {
                PagerNotice::PersistSuggestions(page) => {
                    if let Err(err) = save_suggestions_snapshot(&mut self.store, &page, Utc::now()) {
                        tracing::warn!("failed to save suggestions: {err}");
                    }
                }
                PagerNotice::SystemMessage(message) => self.show_system_message(&message),
                PagerNotice::MacroResolved { name, url } => {
                    if self.awaiting_name.as_deref() != Some(name.as_str()) {
                        continue;
                    }
                    self.awaiting_name = None;
                    match url {
                        Some(url) => self.expand(&name, &url),
                        None => self.note(format!("no macro named {name:?}")),
                    }
                }
            }
        }
    }

    fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::PopupTriggerElapsed { generation } => {
                if self
                    .popup_trigger
                    .as_ref()
                    .is_none_or(|trigger| trigger.generation != generation)
                {
                    return;
                }
                self.popup_trigger = None;
                // Typing after the `!` cancels the trigger.
                if is_popup_trigger(&self.draft, self.draft.len()) {
                    self.open_popup();
                }
            }
            SessionEvent::MacroAdded { name, url, result } => match result {
                Ok(AddMacroResponse {
                    code: ErrorCode::Success,
                    data,
                }) => {
                    let item = data.unwrap_or_else(|| MacroItem::new(name, url));
                    self.pager.record_added(&item);
                    self.note(format!("added {}: {}", item.name, item.markup()));
                }
                Ok(response) => self.note(format!(
                    "could not add {name}: {}",
                    response.code.user_message()
                )),
                Err(err) => {
                    tracing::warn!("adding macro {name:?} failed: {err}");
                    self.note(format!("could not add {name}: {err}"));
                }
            },
        }
    }

    fn type_text(&mut self, text: &str) {
        self.draft.push_str(text);
        let cursor = self.draft.len();

        if is_popup_trigger(&self.draft, cursor) {
            self.schedule_popup_trigger();
            self.show_draft();
            return;
        }
        let Some(name) = pattern_name_before_cursor(&self.draft, cursor).map(str::to_string) else {
            self.show_draft();
            return;
        };
        match self.pager.resolve_name(&name) {
            NameLookup::Known(url) => self.expand(&name, &url),
            NameLookup::Missing => self.show_draft(),
            NameLookup::Unknown => self.awaiting_name = Some(name),
        }
    }

    fn expand(&mut self, name: &str, url: &str) {
        let edit = expand_pattern(&self.draft, self.draft.len(), name, url);
        if edit.text == self.draft {
            return;
        }
        self.draft = edit.text;
        self.report_usage(name.to_string(), UsageTrigger::Direct);
        self.show_draft();
    }

    fn select(&mut self, item: &MacroItem) {
        let edit = insert_selected_macro(&self.draft, self.draft.len(), item);
        self.draft = edit.text;

        self.top_usages.record(item);
        if let Err(err) = self.top_usages.save(&mut self.store) {
            tracing::warn!("failed to save top usages: {err}");
        }
        self.report_usage(item.name.clone(), UsageTrigger::Click);
        self.close_popup();
        self.show_draft();
    }

    fn schedule_popup_trigger(&mut self) {
        if let Some(trigger) = self.popup_trigger.take() {
            trigger.handle.abort();
        }
        self.trigger_generation += 1;
        let generation = self.trigger_generation;
        let tx = self.event_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(POPUP_TRIGGER_DELAY).await;
            let _ = tx.send(SessionEvent::PopupTriggerElapsed { generation });
        });
        self.popup_trigger = Some(PopupTrigger { generation, handle });
    }

    fn add_macro(&mut self, name: String, url: String) {
        if let Validation::Invalid(reason) = validate_new_macro(&name, &url) {
            self.note(format!("could not add {name}: {}", reason.user_message()));
            return;
        }
        let catalog = Arc::clone(&self.catalog);
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = catalog.add(&name, &url, None).await;
            let _ = tx.send(SessionEvent::MacroAdded { name, url, result });
        });
    }

    fn close_popup(&mut self) {
        if let Some(trigger) = self.popup_trigger.take() {
            trigger.handle.abort();
        }
        self.pager.close();
        self.pager.sink_mut().clear();
    }

    fn show_system_message(&mut self, message: &SystemMessage) {
        if let Err(err) = system_message::remember(&mut self.store, message) {
            tracing::warn!("failed to store system message: {err}");
        }
        let now = Utc::now().timestamp();
        let Some(pending) = system_message::pending(&self.store, now) else {
            return;
        };
        self.note(format!("notice: {}", pending.content));
        if let Err(err) = system_message::record_impression(&mut self.store, &pending, now) {
            tracing::warn!("failed to store system message impression: {err}");
        }
    }

    fn listed(&self, n: usize) -> Option<MacroItem> {
        self.pager.sink().shown().get(n.checked_sub(1)?).cloned()
    }

    fn report_usage(&self, name: String, trigger: UsageTrigger) {
        let catalog = Arc::clone(&self.catalog);
        tokio::spawn(async move {
            if let Err(err) = catalog.report_usage(&name, trigger).await {
                tracing::debug!("usage report for {name:?} failed: {err}");
            }
        });
    }

    fn report_broken(&self, name: String) {
        let catalog = Arc::clone(&self.catalog);
        tokio::spawn(async move {
            if let Err(err) = catalog.report_broken(&name).await {
                tracing::warn!("report for {name:?} failed: {err}");
            }
        });
    }

    fn show_draft(&mut self) {
        let line = format!("draft: {}", self.draft);
        self.note(line);
    }

    fn note(&mut self, line: impl Into<String>) {
        self.pager.sink_mut().note(line);
    }

    fn take_output(&mut self) -> Vec<String> {
        self.pager.sink_mut().take_output()
    }
}

impl<C: MacroCatalog, K: KeyValueStore> Drop for Session<C, K> {
    fn drop(&mut self) {
        if let Some(trigger) = self.popup_trigger.take() {
            trigger.handle.abort();
        }
    }
}

/// Run the session until `:quit` or end of input.
pub async fn run<C, K, W>(
    mut session: Session<C, K>,
    mut events: SessionEvents,
    input: impl tokio::io::AsyncRead + Unpin,
    mut out: W,
) -> anyhow::Result<()>
where
    C: MacroCatalog,
    K: KeyValueStore,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(input).lines();
    session.open_popup();
    flush(&mut session, &mut out).await?;

    loop {
        tokio::select! {
            biased;

            Some(event) = events.pager.recv() => session.handle_event(event),
            Some(event) = events.session.recv() => session.handle_session_event(event),
            line = lines.next_line() => {
                let Some(line) = line.context("read input")? else {
                    break;
                };
                if !session.handle_line(&line) {
                    break;
                }
            }
        }
        flush(&mut session, &mut out).await?;
    }

    session.close_popup();
    flush(&mut session, &mut out).await
}

async fn flush<C: MacroCatalog, K: KeyValueStore, W: AsyncWrite + Unpin>(
    session: &mut Session<C, K>,
    out: &mut W,
) -> anyhow::Result<()> {
    for line in session.take_output() {
        out.write_all(line.as_bytes()).await?;
        out.write_all(b"\n").await?;
    }
    out.flush().await?;
    Ok(())
}
