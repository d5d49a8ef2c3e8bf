//! The per-item actor carrying out the [`registration`][crate::registration] handshake on the bus.
//!
//! The actor owns the item's connection, the watcher proxy, and every task watching the bus on the
//! item's behalf. All of that is touched from the actor loop only, one command or completion at a
//! time. Bus round trips run in helper tasks that report back through a channel, tagged with the
//! registration attempt they were started for.

use crate::*;

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use futures::StreamExt;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use zbus::{
    fdo::{DBusProxy, RequestNameFlags, RequestNameReply},
    names::{BusName, WellKnownName},
    SignalContext,
};

use crate::{interface::EventSink, proxy::StatusNotifierWatcherProxy, registration::*};

/// Requests from the item handle.
#[derive(Debug)]
pub(crate) enum Command {
    Register,
    Emit(ItemSignal),
    Release,
}

/// Everything the actor shares with the item handle.
pub(crate) struct Context {
    pub state: Arc<Mutex<ItemState>>,
    pub events: EventSink,
    pub registration: Arc<watch::Sender<RegistrationState>>,
    pub config: ItemConfig,
    /// A connection to use instead of opening a dedicated one.
    pub connection: Option<zbus::Connection>,
}

/// Completion of a helper task. Steps that produce a bus handle hand it over here, since the
/// state machine only sees that the step succeeded.
enum Step {
    Input(Input),
    Connected(zbus::Connection),
    WatcherReady(StatusNotifierWatcherProxy<'static>, bool),
}

#[derive(Clone)]
struct Completions {
    attempt: u64,
    tx: mpsc::UnboundedSender<(u64, Step)>,
}

impl Completions {
    fn send(&self, step: Step) {
        // the actor is gone, so nobody cares anymore
        let _ = self.tx.send((self.attempt, step));
    }

    fn input(&self, input: Input) {
        self.send(Step::Input(input));
    }
}

/// Start the actor for one registration session.
///
/// # Panics
///
/// If called outside of a tokio runtime.
pub(crate) fn spawn(ctx: Context, commands: mpsc::UnboundedReceiver<Command>) {
    let (driver, completions) = Driver::new(ctx);
    tokio::spawn(driver.run(commands, completions));
}

struct Driver {
    machine: Machine,
    ctx: Context,
    tx: mpsc::UnboundedSender<(u64, Step)>,

    connection: Option<zbus::Connection>,
    watcher: Option<StatusNotifierWatcherProxy<'static>>,

    /// The one-shot step currently in flight.
    pending: Option<JoinHandle<()>>,
    watch_task: Option<JoinHandle<()>>,
    host_task: Option<JoinHandle<()>>,
    name_task: Option<JoinHandle<()>>,
}

impl Driver {
    fn new(ctx: Context) -> (Self, mpsc::UnboundedReceiver<(u64, Step)>) {
        let machine = Machine::new(ctx.config.bus_identity_policy, ctx.config.name_namespace.clone());
        let (tx, completions) = mpsc::unbounded_channel();
        let driver = Driver {
            machine,
            ctx,
            tx,
            connection: None,
            watcher: None,
            pending: None,
            watch_task: None,
            host_task: None,
            name_task: None,
        };
        (driver, completions)
    }

    /// Turn a helper task's completion into input for the machine, taking over any bus handle it
    /// carries. Completions of an earlier attempt are dropped along with their handles.
    fn accept(&mut self, attempt: u64, step: Step) -> Option<Input> {
        if attempt != self.machine.attempt() {
            log::debug!("dropping result of an earlier registration attempt");
            return None;
        }
        Some(match step {
            Step::Input(input) => input,
            Step::Connected(con) => {
                self.connection = Some(con);
                Input::Connected
            }
            Step::WatcherReady(proxy, host_registered) => {
                self.watcher = Some(proxy);
                Input::WatcherReady { host_registered }
            }
        })
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut completions: mpsc::UnboundedReceiver<(u64, Step)>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Register) => self.step(Input::Register).await,
                    Some(Command::Emit(signal)) => self.emit(signal).await,
                    // a dropped handle releases too
                    Some(Command::Release) | None => {
                        self.step(Input::Release).await;
                        break;
                    }
                },
                Some((attempt, step)) = completions.recv() => {
                    if let Some(input) = self.accept(attempt, step) {
                        self.step(input).await;
                    }
                }
            }
        }
        log::debug!("item {} released", self.id());
    }

    /// Feed `input` to the machine, and carry out what it asks for. Effects that complete inline
    /// feed their outcome back right away.
    async fn step(&mut self, input: Input) {
        let mut inputs = VecDeque::from([input]);
        while let Some(input) = inputs.pop_front() {
            for effect in self.machine.handle(input) {
                if let Some(next) = self.perform(effect).await {
                    inputs.push_back(next);
                }
            }
        }
    }

    async fn perform(&mut self, effect: Effect) -> Option<Input> {
        log::debug!("item {}: {:?}", self.id(), effect);
        match effect {
            Effect::Connect => {
                let supplied = self.ctx.connection.clone();
                let address = self.ctx.config.bus_address.clone();
                let done = self.completions();
                self.pending = Some(tokio::spawn(async move {
                    match connect(supplied, address).await {
                        Ok(con) => done.send(Step::Connected(con)),
                        Err(e) => done.input(Input::ConnectFailed(e)),
                    }
                }));
            }
            Effect::WatchWatcher => {
                let con = self.connection.clone()?;
                let done = self.completions();
                self.watch_task = Some(tokio::spawn(async move {
                    if let Err(e) = watch_watcher(&con, &done).await {
                        done.input(Input::WatchFailed(e));
                    }
                }));
            }
            Effect::StopWatchingWatcher => abort(&mut self.watch_task),
            Effect::ConnectWatcher => {
                let con = self.connection.clone()?;
                let done = self.completions();
                self.pending = Some(tokio::spawn(async move {
                    match connect_watcher(&con).await {
                        Ok((proxy, host_registered)) => done.send(Step::WatcherReady(proxy, host_registered)),
                        Err(e) => done.input(Input::WatcherFailed(e)),
                    }
                }));
            }
            Effect::AwaitHost => {
                let proxy = self.watcher.clone()?;
                let done = self.completions();
                self.host_task = Some(tokio::spawn(async move {
                    if let Err(e) = await_host(&proxy, &done).await {
                        done.input(Input::WatcherFailed(e));
                    }
                }));
            }
            Effect::StopAwaitingHost => abort(&mut self.host_task),
            Effect::CancelPending => abort(&mut self.pending),
            Effect::ClaimName(name) => {
                let con = self.connection.clone()?;
                let done = self.completions();
                self.name_task = Some(tokio::spawn(async move {
                    if let Err(e) = claim_name(&con, &name, &done).await {
                        log::error!("failed to request name {}: {}", name, e);
                        done.input(Input::NameRefused);
                    }
                }));
            }
            Effect::ReleaseName(name) => {
                abort(&mut self.name_task);
                if let Some(con) = &self.connection {
                    if let Err(e) = con.release_name(name.as_str()).await {
                        log::debug!("failed to release name {}: {}", name, e);
                    }
                }
            }
            Effect::DropWatcher => self.watcher = None,
            Effect::ExportObject => return Some(self.export().await),
            Effect::UnexportObject => {
                if let Some(con) = &self.connection {
                    if let Err(e) = con.object_server().remove::<ItemInterface, _>(names::ITEM_OBJECT).await {
                        log::debug!("failed to unexport item object: {}", e);
                    }
                }
            }
            Effect::Announce(identity) => {
                let Some(proxy) = self.watcher.clone() else {
                    return Some(Input::AnnounceFailed(zbus::Error::Failure("watcher went away".to_string())));
                };
                let service = match identity {
                    BusIdentity::Name(name) => name,
                    BusIdentity::Connection => match self.connection.as_ref().and_then(|con| con.unique_name()) {
                        Some(name) => name.to_string(),
                        None => {
                            return Some(Input::AnnounceFailed(zbus::Error::Failure(
                                "connection has no unique name".to_string(),
                            )))
                        }
                    },
                };
                log::info!("registering item {} as {}", self.id(), service);
                let done = self.completions();
                self.pending = Some(tokio::spawn(async move {
                    match proxy.register_status_notifier_item(&service).await {
                        Ok(()) => done.input(Input::Announced),
                        Err(e) => done.input(Input::AnnounceFailed(e)),
                    }
                }));
            }
            Effect::Disconnect => self.connection = None,
            Effect::SetState(state) => {
                // a released session no longer speaks for the item
                if !self.ctx.events.is_closed() {
                    log::info!("item {} is now {}", self.id(), state);
                    self.ctx.registration.send_replace(state);
                }
            }
            Effect::Report(e) => {
                if e.is_fatal() {
                    log::error!("registering item {} failed: {}", self.id(), e);
                } else {
                    log::warn!("item {} not registered yet: {}", self.id(), e);
                }
                self.ctx.events.send(Event::RegistrationFailed(e));
            }
        }
        None
    }

    async fn export(&mut self) -> Input {
        let Some(con) = &self.connection else {
            return Input::ExportFailed("not connected".to_string());
        };
        let iface = ItemInterface::new(self.ctx.state.clone(), self.ctx.events.clone());
        match con.object_server().at(names::ITEM_OBJECT, iface).await {
            Ok(true) => Input::ObjectExported,
            Ok(false) => Input::ExportFailed(format!("an item is already exported at {}", names::ITEM_OBJECT)),
            Err(e) => Input::ExportFailed(e.to_string()),
        }
    }

    async fn emit(&self, signal: ItemSignal) {
        if self.machine.state() != RegistrationState::Registered {
            return;
        }
        let Some(con) = &self.connection else { return };
        let result = match SignalContext::new(con, names::ITEM_OBJECT) {
            Ok(ctxt) => interface::emit(&ctxt, signal).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            log::error!("failed to emit {:?} for item {}: {}", signal, self.id(), e);
        }
    }

    fn completions(&self) -> Completions {
        Completions { attempt: self.machine.attempt(), tx: self.tx.clone() }
    }

    fn id(&self) -> String {
        self.ctx.state.lock().unwrap().id().to_owned() // unwrap: mutex poisoning is okay
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        for task in [&mut self.pending, &mut self.watch_task, &mut self.host_task, &mut self.name_task] {
            abort(task);
        }
    }
}

fn abort(task: &mut Option<JoinHandle<()>>) {
    if let Some(task) = task.take() {
        task.abort();
    }
}

async fn connect(supplied: Option<zbus::Connection>, address: Option<String>) -> zbus::Result<zbus::Connection> {
    match (supplied, address) {
        (Some(con), _) => Ok(con),
        (None, Some(address)) => zbus::connection::Builder::address(address.as_str())?.build().await,
        (None, None) => zbus::Connection::session().await,
    }
}

/// Report whether the watcher is around, and again every time that changes.
async fn watch_watcher(con: &zbus::Connection, done: &Completions) -> zbus::Result<()> {
    let dbus = DBusProxy::new(con).await?;
    let watcher = WellKnownName::from_static_str_unchecked(names::WATCHER_BUS);
    // subscribe first, so a watcher showing up right after the check below isn't missed
    let mut owner_changes = dbus.receive_name_owner_changed_with_args(&[(0, names::WATCHER_BUS)]).await?;

    if let Err(e) = dbus.start_service_by_name(watcher.clone(), 0).await {
        log::debug!("could not auto-start {}: {}", names::WATCHER_BUS, e);
    }
    if dbus.name_has_owner(BusName::from(watcher)).await? {
        done.input(Input::WatcherAppeared);
    } else {
        done.input(Input::WatcherVanished);
    }

    while let Some(sig) = owner_changes.next().await {
        let args = sig.args()?;
        if args.new_owner().is_some() {
            done.input(Input::WatcherAppeared);
        } else {
            done.input(Input::WatcherVanished);
        }
    }
    Ok(())
}

async fn connect_watcher(con: &zbus::Connection) -> zbus::Result<(StatusNotifierWatcherProxy<'static>, bool)> {
    // uncached, since we re-read IsStatusNotifierHostRegistered and the watcher might not announce
    // changes to it
    let proxy = StatusNotifierWatcherProxy::builder(con)
        .cache_properties(zbus::proxy::CacheProperties::No)
        .build()
        .await?;
    let host_registered = match proxy.is_status_notifier_host_registered().await {
        Ok(registered) => registered,
        Err(e) => {
            log::debug!("could not read IsStatusNotifierHostRegistered: {}", e);
            false
        }
    };
    Ok((proxy, host_registered))
}

/// Report once a host is registered on the watcher.
async fn await_host(proxy: &StatusNotifierWatcherProxy<'static>, done: &Completions) -> zbus::Result<()> {
    let mut registered = proxy.receive_status_notifier_host_registered().await?;
    // a host may have registered between the first check and subscribing
    if proxy.is_status_notifier_host_registered().await.unwrap_or(false) {
        done.input(Input::HostRegistered);
        return Ok(());
    }
    if registered.next().await.is_some() {
        done.input(Input::HostRegistered);
    }
    Ok(())
}

/// Request `name`, then report when it's lost again.
async fn claim_name(con: &zbus::Connection, name: &str, done: &Completions) -> zbus::Result<()> {
    let dbus = DBusProxy::new(con).await?;
    let mut lost = dbus.receive_name_lost_with_args(&[(0, name)]).await?;

    let flags = [RequestNameFlags::DoNotQueue];
    match con.request_name_with_flags(name, flags.into_iter().collect()).await? {
        RequestNameReply::PrimaryOwner | RequestNameReply::AlreadyOwner => {
            log::debug!("acquired name {}", name);
            done.input(Input::NameAcquired);
        }
        reply @ (RequestNameReply::InQueue | RequestNameReply::Exists) => {
            log::debug!("could not acquire name {}: {:?}", name, reply);
            done.input(Input::NameRefused);
            return Ok(());
        }
    }

    if lost.next().await.is_some() {
        log::warn!("lost name {}", name);
        done.input(Input::NameLost);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::{
        io::{BufRead, BufReader},
        process::Stdio,
        time::Duration,
    };
    use tokio::sync::oneshot;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn context(config: ItemConfig) -> (Context, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = Context {
            state: Arc::new(Mutex::new(ItemState::new("app", Category::ApplicationStatus))),
            events: EventSink::new(tx),
            registration: Arc::new(watch::Sender::new(RegistrationState::NotRegistered)),
            config,
            connection: None,
        };
        (ctx, rx)
    }

    fn failure() -> zbus::Error {
        zbus::Error::Failure("test".to_string())
    }

    /// A task that never finishes on its own. The receiver resolves once the task is gone.
    fn parked_task() -> (JoinHandle<()>, oneshot::Receiver<()>) {
        let (alive, gone) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _alive = alive;
            futures::future::pending::<()>().await
        });
        (task, gone)
    }

    async fn assert_stopped(gone: oneshot::Receiver<()>) {
        let result = tokio::time::timeout(TIMEOUT, gone).await;
        assert!(matches!(result, Ok(Err(_))), "task is still running");
    }

    #[test]
    fn test_completions_of_earlier_attempts_are_dropped() {
        let (ctx, _events) = context(ItemConfig::default());
        let (mut driver, mut completions) = Driver::new(ctx);

        driver.machine.handle(Input::Register);
        let first_attempt = driver.completions();
        assert!(driver.accept(0, Step::Input(Input::Connected)).is_none());
        assert!(matches!(driver.accept(1, Step::Input(Input::Connected)), Some(Input::Connected)));

        driver.machine.handle(Input::ConnectFailed(failure()));
        driver.machine.handle(Input::Register);
        assert_eq!(2, driver.machine.attempt());

        // a helper of the first attempt finishing late
        first_attempt.input(Input::WatcherAppeared);
        let (attempt, step) = completions.try_recv().unwrap();
        assert_eq!(1, attempt);
        assert!(driver.accept(attempt, step).is_none());

        driver.completions().input(Input::Connected);
        let (attempt, step) = completions.try_recv().unwrap();
        assert!(matches!(driver.accept(attempt, step), Some(Input::Connected)));
    }

    #[tokio::test]
    async fn test_teardown_stops_helper_tasks() {
        let (ctx, _events) = context(ItemConfig::default());
        let (mut driver, _completions) = Driver::new(ctx);

        let (task, pending) = parked_task();
        driver.pending = Some(task);
        let (task, watching) = parked_task();
        driver.watch_task = Some(task);
        let (task, awaiting_host) = parked_task();
        driver.host_task = Some(task);
        let (task, claiming) = parked_task();
        driver.name_task = Some(task);

        driver.perform(Effect::CancelPending).await;
        driver.perform(Effect::StopWatchingWatcher).await;
        driver.perform(Effect::StopAwaitingHost).await;
        driver.perform(Effect::ReleaseName("org.kde.StatusNotifierItem-1-1".to_string())).await;

        assert!(driver.pending.is_none());
        assert!(driver.watch_task.is_none());
        assert!(driver.host_task.is_none());
        assert!(driver.name_task.is_none());
        for gone in [pending, watching, awaiting_host, claiming] {
            assert_stopped(gone).await;
        }
    }

    #[tokio::test]
    async fn test_dropped_driver_stops_helper_tasks() {
        let (ctx, _events) = context(ItemConfig::default());
        let (mut driver, _completions) = Driver::new(ctx);

        let (task, pending) = parked_task();
        driver.pending = Some(task);
        let (task, watching) = parked_task();
        driver.watch_task = Some(task);
        drop(driver);

        assert_stopped(pending).await;
        assert_stopped(watching).await;
    }

    #[tokio::test]
    async fn test_released_session_keeps_quiet() {
        let (ctx, mut events) = context(ItemConfig::default());
        let registration = ctx.registration.clone();
        let (mut driver, _completions) = Driver::new(ctx);

        driver.ctx.events.close();
        driver.perform(Effect::SetState(RegistrationState::Registered)).await;
        driver.perform(Effect::Report(Error::NoWatcher)).await;

        assert_eq!(RegistrationState::NotRegistered, *registration.borrow());
        assert!(events.try_recv().is_err());
    }

    // ------------------------------------------------------------------------
    // Against a private bus

    /// A `dbus-daemon` of our own, killed on drop.
    struct TestBus {
        daemon: std::process::Child,
        address: String,
    }

    impl TestBus {
        /// `None` if no `dbus-daemon` can be run here.
        fn start() -> Option<TestBus> {
            let spawned = std::process::Command::new("dbus-daemon")
                .args(["--session", "--nofork", "--print-address"])
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .spawn();
            let mut daemon = match spawned {
                Ok(daemon) => daemon,
                Err(e) => {
                    eprintln!("skipping, can't run dbus-daemon: {}", e);
                    return None;
                }
            };
            let mut address = String::new();
            let stdout = daemon.stdout.take().unwrap();
            BufReader::new(stdout).read_line(&mut address).unwrap();
            Some(TestBus { daemon, address: address.trim().to_owned() })
        }

        async fn connect(&self) -> zbus::Connection {
            zbus::connection::Builder::address(self.address.as_str()).unwrap().build().await.unwrap()
        }
    }

    impl Drop for TestBus {
        fn drop(&mut self) {
            let _ = self.daemon.kill();
            let _ = self.daemon.wait();
        }
    }

    /// Just enough of a StatusNotifierWatcher to register items with.
    struct FakeWatcher {
        host_registered: bool,
        reject: bool,
        items: Arc<Mutex<Vec<String>>>,
    }

    #[zbus::interface(name = "org.kde.StatusNotifierWatcher")]
    impl FakeWatcher {
        fn register_status_notifier_item(&self, service: &str) -> zbus::fdo::Result<()> {
            if self.reject {
                return Err(zbus::fdo::Error::Failed("not today".to_string()));
            }
            self.items.lock().unwrap().push(service.to_owned());
            Ok(())
        }

        #[zbus(property)]
        fn is_status_notifier_host_registered(&self) -> bool {
            self.host_registered
        }

        #[zbus(signal)]
        async fn status_notifier_host_registered(ctxt: &SignalContext<'_>) -> zbus::Result<()>;
    }

    async fn serve_watcher(
        bus: &TestBus,
        host_registered: bool,
        reject: bool,
    ) -> (zbus::Connection, Arc<Mutex<Vec<String>>>) {
        let items: Arc<Mutex<Vec<String>>> = Arc::default();
        let con = bus.connect().await;
        let watcher = FakeWatcher { host_registered, reject, items: items.clone() };
        assert!(con.object_server().at(names::WATCHER_OBJECT, watcher).await.unwrap());
        con.request_name(names::WATCHER_BUS).await.unwrap();
        (con, items)
    }

    async fn watcher(con: &zbus::Connection) -> zbus::object_server::InterfaceRef<FakeWatcher> {
        con.object_server().interface::<_, FakeWatcher>(names::WATCHER_OBJECT).await.unwrap()
    }

    async fn next_event(events: &mut EventReceiver) -> Event {
        tokio::time::timeout(TIMEOUT, events.recv()).await.expect("no event arrived").expect("event channel closed")
    }

    async fn wait_for_state(item: &StatusNotifierItem, expected: RegistrationState) {
        let mut state = item.watch_state();
        let reached = tokio::time::timeout(TIMEOUT, state.wait_for(|s| *s == expected))
            .await
            .map(|waited| waited.is_ok())
            .unwrap_or(false);
        assert!(reached, "item never got {}, is {}", expected, item.state());
    }

    fn item_on(bus: &TestBus) -> (StatusNotifierItem, EventReceiver) {
        StatusNotifierItem::builder("app", Category::ApplicationStatus)
            .bus_address(bus.address.as_str())
            .bus_identity_policy(BusIdentityPolicy::Always)
            .build()
    }

    #[tokio::test]
    async fn test_registers_once_watcher_and_host_show_up() {
        let Some(bus) = TestBus::start() else { return };
        let (item, mut events) = item_on(&bus);

        item.register();
        assert!(matches!(next_event(&mut events).await, Event::RegistrationFailed(Error::NoWatcher)));
        assert_eq!(RegistrationState::Registering, item.state());

        let (watcher_con, items) = serve_watcher(&bus, false, false).await;
        assert!(matches!(next_event(&mut events).await, Event::RegistrationFailed(Error::NoHost)));
        assert_eq!(RegistrationState::Registering, item.state());

        let iface = watcher(&watcher_con).await;
        iface.get_mut().await.host_registered = true;
        FakeWatcher::status_notifier_host_registered(iface.signal_context()).await.unwrap();
        wait_for_state(&item, RegistrationState::Registered).await;

        let registered = items.lock().unwrap().clone();
        assert_eq!(1, registered.len());
        assert!(registered[0].starts_with("org.kde.StatusNotifierItem-"), "registered as {}", registered[0]);

        // the item answers under the name it registered with
        let proxy = zbus::Proxy::new(&watcher_con, registered[0].as_str(), names::ITEM_OBJECT, names::ITEM_INTERFACE)
            .await
            .unwrap();
        assert_eq!("app", proxy.get_property::<String>("Id").await.unwrap());
        assert_eq!("/NO_DBUSMENU", proxy.get_property::<zbus::zvariant::OwnedObjectPath>("Menu").await.unwrap().as_str());

        let mut new_status = proxy.receive_signal("NewStatus").await.unwrap();
        item.set_status(Status::NeedsAttention);
        let msg = tokio::time::timeout(TIMEOUT, new_status.next()).await.unwrap().unwrap();
        assert_eq!("NeedsAttention", msg.body().deserialize::<String>().unwrap());
    }

    #[tokio::test]
    async fn test_release_while_registering() {
        let Some(bus) = TestBus::start() else { return };
        let (item, mut events) = item_on(&bus);

        item.register();
        assert!(matches!(next_event(&mut events).await, Event::RegistrationFailed(Error::NoWatcher)));
        item.release();
        assert_eq!(RegistrationState::NotRegistered, item.state());

        let (_watcher_con, items) = serve_watcher(&bus, true, false).await;
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(events.try_recv().is_err());
        assert!(items.lock().unwrap().is_empty());
        assert_eq!(RegistrationState::NotRegistered, item.state());
    }

    #[tokio::test]
    async fn test_rejected_registration_can_be_retried() {
        let Some(bus) = TestBus::start() else { return };
        let (watcher_con, items) = serve_watcher(&bus, true, true).await;
        let (item, mut events) = item_on(&bus);

        item.register();
        assert!(matches!(next_event(&mut events).await, Event::RegistrationFailed(Error::Rejected(_))));
        wait_for_state(&item, RegistrationState::Failed).await;

        watcher(&watcher_con).await.get_mut().await.reject = false;
        item.register();
        wait_for_state(&item, RegistrationState::Registered).await;
        assert_eq!(1, items.lock().unwrap().len());
    }
}
