//! Mood Bubbles entry point
//!
//! On the web this mounts the field into the page and drives it from
//! `requestAnimationFrame`. Natively it plays a headless demo session.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_field {
    use std::cell::{Cell, RefCell};
    use std::collections::BTreeMap;
    use std::rc::Rc;
    use wasm_bindgen::prelude::*;
    use web_sys::{CustomEvent, CustomEventInit, Document, Element, EventTarget, HtmlElement};

    use mood_bubbles::field::ViewPhase;
    use mood_bubbles::session::{Session, SessionStep, Stage, StageKind};
    use mood_bubbles::sim::{BubbleId, FateReport, PointerEvent, RecordingSink, Viewport};
    use mood_bubbles::source::CategoryTable;
    use mood_bubbles::{BubbleField, EngineSettings, FieldPreset};

    thread_local! {
        static HOST: RefCell<Option<Rc<RefCell<Host>>>> = const { RefCell::new(None) };
        /// Set when an unmount arrives while the host is busy
        static UNMOUNT_REQUESTED: Cell<bool> = const { Cell::new(false) };
    }

    /// A registered DOM listener; removed from its target when dropped
    struct Listener {
        target: EventTarget,
        kind: &'static str,
        closure: Closure<dyn FnMut(web_sys::Event)>,
    }

    impl Listener {
        fn add(
            target: &EventTarget,
            kind: &'static str,
            handler: impl FnMut(web_sys::Event) + 'static,
        ) -> Self {
            let closure = Closure::<dyn FnMut(web_sys::Event)>::new(handler);
            let _ = target.add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref());
            Self {
                target: target.clone(),
                kind,
                closure,
            }
        }
    }

    impl Drop for Listener {
        fn drop(&mut self) {
            let _ = self
                .target
                .remove_event_listener_with_callback(self.kind, self.closure.as_ref().unchecked_ref());
        }
    }

    /// Events produced while the host was borrowed, dispatched after release
    struct Outgoing {
        target: HtmlElement,
        fates: Vec<Vec<FateReport>>,
        summary: Option<String>,
    }

    impl Outgoing {
        fn dispatch(self) {
            for batch in self.fates {
                match serde_json::to_string(&batch) {
                    Ok(json) => dispatch_json(&self.target, "fate", &json),
                    Err(e) => log::error!("Failed to encode fate batch: {}", e),
                }
            }
            if let Some(summary) = self.summary {
                dispatch_json(&self.target, "sessioncomplete", &summary);
            }
        }
    }

    fn dispatch_json(target: &HtmlElement, name: &str, json: &str) {
        let detail = js_sys::JSON::parse(json).unwrap_or_else(|_| JsValue::from_str(json));
        let init = CustomEventInit::new();
        init.set_detail(&detail);
        match CustomEvent::new_with_event_init_dict(name, &init) {
            Ok(event) => {
                let _ = target.dispatch_event(&event);
            }
            Err(e) => log::warn!("Failed to create {} event: {:?}", name, e),
        }
    }

    /// Page host: field, session, DOM nodes and listeners
    struct Host {
        field: BubbleField<RecordingSink>,
        session: Session,
        document: Document,
        container: HtmlElement,
        nodes: BTreeMap<BubbleId, HtmlElement>,
        listeners: Vec<Listener>,
        /// Pending animation frame
        raf: Option<i32>,
        /// Fate batches waiting for dispatch
        outbox: Vec<Vec<FateReport>>,
        /// Selections JSON once the session has finished
        summary: Option<String>,
        running: bool,
    }

    impl Host {
        /// Mount the session's current category, skipping unreadable ones
        fn mount_current(&mut self, now: f64) -> bool {
            while !self.session.is_finished() {
                match self.session.current_backlog() {
                    Ok(backlog) => {
                        let header = self.session.header().unwrap_or_default().to_string();
                        let category = self.session.category().unwrap_or_default().to_string();
                        self.field.mount(backlog, category, header, now);
                        self.update_header();
                        return true;
                    }
                    Err(e) => {
                        log::warn!("Skipping category: {}", e);
                        self.session.advance();
                    }
                }
            }
            false
        }

        fn update_header(&self) {
            if let Some(el) = self.document.get_element_by_id("stage-title") {
                el.set_text_content(Some(self.field.header()));
            }
            if let Some(el) = self.document.get_element_by_id("category-title") {
                el.set_text_content(Some(self.field.category()));
            }
        }

        /// Move queued reports into the session and the outbox
        fn collect_reports(&mut self) {
            for batch in self.field.sink_mut().drain() {
                self.session.record(&batch);
                self.outbox.push(batch);
            }
        }

        /// Move on when the field is empty. Only called from the frame loop:
        /// finishing drops the listeners.
        fn settle(&mut self, now: f64) {
            self.collect_reports();
            if !self.field.is_exhausted() {
                return;
            }
            match self.session.advance() {
                SessionStep::Finished => self.finish(),
                SessionStep::NextCategory | SessionStep::NextStage => {
                    if !self.mount_current(now) {
                        self.finish();
                    }
                }
            }
        }

        fn finish(&mut self) {
            log::info!("Session complete");
            self.summary = serde_json::to_string(self.session.all_selections()).ok();
            self.teardown();
        }

        /// Stop timers and the frame loop, drop listeners and bubble nodes
        fn teardown(&mut self) {
            self.collect_reports();
            self.field.unmount();
            self.listeners.clear();
            if let (Some(handle), Some(window)) = (self.raf.take(), web_sys::window()) {
                let _ = window.cancel_animation_frame(handle);
            }
            for (_, node) in std::mem::take(&mut self.nodes) {
                node.remove();
            }
            self.running = false;
        }

        fn take_outgoing(&mut self) -> Outgoing {
            self.collect_reports();
            Outgoing {
                target: self.container.clone(),
                fates: std::mem::take(&mut self.outbox),
                summary: self.summary.take(),
            }
        }

        /// Mirror bubble views into absolutely positioned divs
        fn sync_dom(&mut self, now: f64) {
            let views = self.field.views(now);
            let live: Vec<BubbleId> = views.iter().map(|v| v.id).collect();
            self.nodes.retain(|id, node| {
                let keep = live.contains(id);
                if !keep {
                    node.remove();
                }
                keep
            });

            for view in views {
                let node = match self.nodes.get(&view.id) {
                    Some(node) => node.clone(),
                    None => match self.create_node(view.id, &view.text) {
                        Some(node) => node,
                        None => continue,
                    },
                };
                let style = node.style();
                let _ = style.set_property("left", &format!("{}px", view.x - view.size / 2.0));
                let _ = style.set_property("top", &format!("{}px", view.y - view.size / 2.0));
                let _ = style.set_property("width", &format!("{}px", view.size));
                let _ = style.set_property("height", &format!("{}px", view.size));
                let _ = style.set_property("opacity", &view.opacity.to_string());
                let classes = node.class_list();
                let _ = classes.toggle_with_force("dragging", view.phase == ViewPhase::Dragging);
                let _ = classes.toggle_with_force("fading", view.phase == ViewPhase::Fading);
            }
        }

        fn create_node(&mut self, id: BubbleId, text: &str) -> Option<HtmlElement> {
            let node: HtmlElement = self.document.create_element("div").ok()?.dyn_into().ok()?;
            node.set_class_name("bubble");
            let _ = node.set_attribute("data-id", &id.to_string());
            node.set_text_content(Some(text));
            self.container.append_child(&node).ok()?;
            self.nodes.insert(id, node.clone());
            Some(node)
        }
    }

    /// Run `f` with the host borrowed, then dispatch whatever it produced.
    ///
    /// Page listeners for `fate` may call back into `unmount_field`, so no
    /// event is dispatched while the borrow is held.
    fn with_host<R>(host: &Rc<RefCell<Host>>, f: impl FnOnce(&mut Host) -> R) -> Option<R> {
        let (result, outgoing) = {
            let Ok(mut h) = host.try_borrow_mut() else {
                log::warn!("Host busy, dropping re-entrant call");
                return None;
            };
            let result = f(&mut h);
            (result, h.take_outgoing())
        };
        outgoing.dispatch();
        Some(result)
    }

    fn now_ms() -> f64 {
        web_sys::window()
            .and_then(|w| w.performance())
            .map(|p| p.now())
            .unwrap_or_else(js_sys::Date::now)
    }

    fn viewport() -> Viewport {
        let window = web_sys::window();
        let dim = |v: Option<Result<JsValue, JsValue>>| {
            v.and_then(Result::ok).and_then(|v| v.as_f64()).unwrap_or(0.0) as f32
        };
        Viewport::new(
            dim(window.as_ref().map(|w| w.inner_width())),
            dim(window.as_ref().map(|w| w.inner_height())),
        )
    }

    /// Stage tables come from `<script type="text/csv" data-stage="...">`
    fn load_stages(document: &Document) -> Vec<Stage> {
        StageKind::ALL
            .into_iter()
            .filter_map(|kind| {
                let selector = format!("script[data-stage='{}']", kind.as_str());
                let text = document.query_selector(&selector).ok()??.text_content()?;
                match CategoryTable::from_csv(&text) {
                    Ok(table) => Some(Stage::new(kind, table)),
                    Err(e) => {
                        log::warn!("Stage '{}' unavailable: {}", kind.title(), e);
                        None
                    }
                }
            })
            .collect()
    }

    pub fn run() {
        console_error_panic_hook::set_once();
        if console_log::init_with_level(log::Level::Info).is_err() {
            web_sys::console::warn_1(&"Logger already initialized".into());
        }

        log::info!("Mood Bubbles starting...");

        let Some(document) = web_sys::window().and_then(|w| w.document()) else {
            log::error!("No document");
            return;
        };
        let Some(container) = document
            .get_element_by_id("field")
            .and_then(|el| el.dyn_into::<HtmlElement>().ok())
        else {
            log::error!("No #field element");
            return;
        };

        let mut settings = EngineSettings::load();
        if let Some(preset) = container
            .get_attribute("data-preset")
            .and_then(|p| FieldPreset::from_str(&p))
        {
            settings.apply_preset(preset);
        }

        let session = Session::new(load_stages(&document));
        if session.is_finished() {
            log::error!("No stage tables found");
            return;
        }

        let seed = js_sys::Date::now() as u64;
        let field = match BubbleField::new(settings, viewport(), seed, RecordingSink::new()) {
            Ok(field) => field,
            Err(e) => {
                log::error!("Invalid settings: {}", e);
                return;
            }
        };

        let host = Rc::new(RefCell::new(Host {
            field,
            session,
            document,
            container,
            nodes: BTreeMap::new(),
            listeners: Vec::new(),
            raf: None,
            outbox: Vec::new(),
            summary: None,
            running: true,
        }));

        if !host.borrow_mut().mount_current(now_ms()) {
            log::error!("Nothing to show");
            return;
        }
        log::info!("Field mounted with seed: {}", seed);

        UNMOUNT_REQUESTED.with(|f| f.set(false));
        setup_listeners(&host);
        HOST.with(|h| *h.borrow_mut() = Some(host.clone()));
        request_animation_frame(host);
    }

    fn setup_listeners(host: &Rc<RefCell<Host>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let container: EventTarget = host.borrow().container.clone().into();
        let window: EventTarget = window.into();
        let mut listeners = Vec::new();

        // Pointer down on a bubble starts a drag
        {
            let host = host.clone();
            listeners.push(Listener::add(&container, "pointerdown", move |event| {
                let Some(event) = event.dyn_ref::<web_sys::PointerEvent>() else {
                    return;
                };
                let (x, y) = (event.client_x() as f32, event.client_y() as f32);
                let tagged = event
                    .target()
                    .and_then(|t| t.dyn_into::<Element>().ok())
                    .and_then(|el| el.closest("[data-id]").ok().flatten())
                    .and_then(|el| el.get_attribute("data-id"))
                    .and_then(|s| BubbleId::parse(&s));
                with_host(&host, |h| {
                    if let Some(id) = tagged.or_else(|| h.field.hit_test(x, y)) {
                        event.prevent_default();
                        h.field.pointer(PointerEvent::Down { id, x, y });
                    }
                });
            }));
        }

        // Move and up are tracked on the window so fast drags don't escape
        {
            let host = host.clone();
            listeners.push(Listener::add(&window, "pointermove", move |event| {
                let Some(event) = event.dyn_ref::<web_sys::PointerEvent>() else {
                    return;
                };
                let (x, y) = (event.client_x() as f32, event.client_y() as f32);
                with_host(&host, |h| {
                    if h.field.state().drag.is_some() {
                        h.field.pointer(PointerEvent::Move { x, y });
                    }
                });
            }));
        }
        {
            let host = host.clone();
            listeners.push(Listener::add(&window, "pointerup", move |event| {
                let Some(event) = event.dyn_ref::<web_sys::PointerEvent>() else {
                    return;
                };
                let (x, y) = (event.client_x() as f32, event.client_y() as f32);
                with_host(&host, |h| {
                    h.field.pointer(PointerEvent::Up { x, y });
                });
            }));
        }

        {
            let host = host.clone();
            listeners.push(Listener::add(&window, "resize", move |_event| {
                with_host(&host, |h| h.field.resize(viewport()));
            }));
        }

        host.borrow_mut().listeners = listeners;
    }

    /// Schedule the next frame under the field's current generation,
    /// replacing any frame already pending
    fn request_animation_frame(host: Rc<RefCell<Host>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let Ok(mut h) = host.try_borrow_mut() else {
            return;
        };
        if let Some(handle) = h.raf.take() {
            let _ = window.cancel_animation_frame(handle);
        }
        let generation = h.field.generation();
        let frame_host = host.clone();
        let closure = Closure::once(move |time: f64| {
            frame(frame_host, generation, time);
        });
        h.raf = window
            .request_animation_frame(closure.as_ref().unchecked_ref())
            .ok();
        closure.forget();
    }

    fn frame(host: Rc<RefCell<Host>>, generation: u64, time: f64) {
        if UNMOUNT_REQUESTED.with(|f| f.replace(false)) {
            with_host(&host, |h| h.teardown());
            log::info!("Field unmounted");
            return;
        }

        let keep_running = with_host(&host, |h| {
            h.raf = None;
            if !h.running {
                return false;
            }
            // Frames scheduled before a remount belong to the old backlog
            if h.field.advance_for(generation, time).is_none() {
                return false;
            }
            h.settle(time);
            if h.running {
                h.sync_dom(time);
            }
            h.running
        });

        if keep_running == Some(true) {
            request_animation_frame(host);
        }
    }

    /// Tear the field down and remove every listener it registered
    pub fn unmount() {
        let Some(host) = HOST.with(|h| h.borrow_mut().take()) else {
            return;
        };
        if host.try_borrow().is_err() {
            // Called from inside a host update; the next frame tears down
            UNMOUNT_REQUESTED.with(|f| f.set(true));
            log::info!("Unmount deferred to next frame");
            return;
        }
        with_host(&host, |h| h.teardown());
        log::info!("Field unmounted");
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_field::run();
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn unmount_field() {
    wasm_field::unmount();
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Mood Bubbles (native) starting...");
    log::info!("The interactive field runs in the browser; playing a headless session");

    let data_dir = std::env::args().nth(1);
    let stages = match demo::load_stages(data_dir.as_deref()) {
        Ok(stages) => stages,
        Err(e) => {
            log::error!("Failed to load stage tables: {}", e);
            std::process::exit(1);
        }
    };

    match demo::play(stages, 0x6d6f6f64) {
        Ok(session) => {
            for kind in mood_bubbles::session::StageKind::ALL {
                println!("{}: {}", kind.title(), session.selections(kind).join(", "));
            }
        }
        Err(e) => {
            log::error!("Demo session failed: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod demo {
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;

    use mood_bubbles::session::{Session, SessionStep, Stage, StageKind};
    use mood_bubbles::settings::SettingsError;
    use mood_bubbles::sim::{PointerEvent, RecordingSink, Viewport};
    use mood_bubbles::source::{CategoryTable, SourceError};
    use mood_bubbles::{BubbleField, EngineSettings};

    const POSITIVE: &str = "Joyful,Peaceful,Confident\n\
                            Happy,Calm,Capable\n\
                            Delighted,Relaxed,Proud\n\
                            Excited,Content,Strong\n";
    const NEGATIVE: &str = "Sad,Anxious,Angry\n\
                            Lonely,Worried,Frustrated\n\
                            Disappointed,Nervous,Irritated\n";
    const NEEDS: &str = "Connection,Autonomy\n\
                         Belonging,Choice\n\
                         Support,Freedom\n\
                         Understanding,Space\n";

    /// Simulated user decisions are taken this often
    const DECISION_MS: f64 = 700.0;
    /// Give up after an hour of simulated time
    const MAX_SESSION_MS: f64 = 3_600_000.0;

    #[derive(Debug, thiserror::Error)]
    pub enum DemoError {
        #[error(transparent)]
        Settings(#[from] SettingsError),
        #[error(transparent)]
        Source(#[from] SourceError),
        #[error("session did not finish within {0}ms")]
        Timeout(f64),
        #[error("failed to read {path}: {source}")]
        Io {
            path: String,
            source: std::io::Error,
        },
    }

    /// Tables from `<dir>/<stage file>`, or the built-in ones
    pub fn load_stages(dir: Option<&str>) -> Result<Vec<Stage>, DemoError> {
        StageKind::ALL
            .into_iter()
            .map(|kind| {
                let text = match dir {
                    Some(dir) => {
                        let path = std::path::Path::new(dir).join(kind.data_file());
                        std::fs::read_to_string(&path).map_err(|source| DemoError::Io {
                            path: path.display().to_string(),
                            source,
                        })?
                    }
                    None => match kind {
                        StageKind::Positive => POSITIVE,
                        StageKind::Negative => NEGATIVE,
                        StageKind::Needs => NEEDS,
                    }
                    .to_string(),
                };
                Ok(Stage::new(kind, CategoryTable::from_csv(&text)?))
            })
            .collect()
    }

    fn mount_current(
        field: &mut BubbleField<RecordingSink>,
        session: &mut Session,
        now: f64,
    ) -> bool {
        while !session.is_finished() {
            match session.current_backlog() {
                Ok(backlog) => {
                    let header = session.header().unwrap_or_default().to_string();
                    let category = session.category().unwrap_or_default().to_string();
                    field.mount(backlog, category, header, now);
                    return true;
                }
                Err(e) => {
                    log::warn!("Skipping category: {}", e);
                    session.advance();
                }
            }
        }
        false
    }

    /// Play a whole session with a seeded simulated user: it clicks some
    /// bubbles, drags some off screen and lets the rest drift away.
    pub fn play(stages: Vec<Stage>, seed: u64) -> Result<Session, DemoError> {
        let viewport = Viewport::new(1280.0, 800.0);
        let mut field = BubbleField::new(EngineSettings::default(), viewport, seed, RecordingSink::new())?;
        let mut session = Session::new(stages);
        let mut user = Pcg32::seed_from_u64(seed ^ 0x75736572);

        let mut now = 0.0;
        let mut next_decision = DECISION_MS;
        if !mount_current(&mut field, &mut session, now) {
            return Ok(session);
        }

        while now <= MAX_SESSION_MS {
            now += 50.0;
            field.advance(now);

            if now >= next_decision {
                next_decision += DECISION_MS;
                let items = &field.state().items;
                if !items.is_empty() {
                    let bubble = &items[user.random_range(0..items.len())];
                    let (id, x, y) = (bubble.id, bubble.pos.x, bubble.pos.y);
                    match user.random_range(0..4) {
                        0 | 1 => {
                            field.pointer(PointerEvent::Down { id, x, y });
                            field.pointer(PointerEvent::Up { x, y });
                        }
                        2 => {
                            field.pointer(PointerEvent::Down { id, x, y });
                            field.pointer(PointerEvent::Move { x: 10.0, y });
                        }
                        _ => {}
                    }
                }
            }

            let batches = field.sink_mut().drain();
            for batch in &batches {
                for report in batch {
                    log::info!(
                        "[{} / {}] {} {}",
                        report.header,
                        report.category,
                        if report.was_selected { "kept" } else { "let go" },
                        report.item
                    );
                }
                session.record(batch);
            }

            if field.is_exhausted() {
                if session.advance() == SessionStep::Finished
                    || !mount_current(&mut field, &mut session, now)
                {
                    field.unmount();
                    return Ok(session);
                }
            }
        }

        Err(DemoError::Timeout(MAX_SESSION_MS))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_builtin_session_finishes() {
            let stages = load_stages(None).unwrap();
            let session = play(stages, 7).unwrap();
            assert!(session.is_finished());
            let kept: usize = StageKind::ALL
                .iter()
                .map(|k| session.selections(*k).len())
                .sum();
            assert!(kept > 0);
        }

        #[test]
        fn test_missing_dir_is_io_error() {
            let err = load_stages(Some("/nonexistent/mood-bubbles")).unwrap_err();
            assert!(matches!(err, DemoError::Io { .. }));
        }
    }
}
