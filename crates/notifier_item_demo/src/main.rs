use anyhow::Result;
use notifier_item::{Event, IconSlot, RegistrationState, Status, StatusNotifierItem};

mod opts;

fn main() {
    let opts = opts::Opt::from_env();

    let log_level_filter = if opts.log_debug { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    if std::env::var("RUST_LOG").is_ok() {
        pretty_env_logger::init_timed();
    } else {
        pretty_env_logger::formatted_timed_builder()
            .filter(Some("notifier_item_demo"), log_level_filter)
            .filter(Some("notifier_item"), log_level_filter)
            .init();
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to initialize tokio runtime");
    if let Err(e) = rt.block_on(run(opts)) {
        log::error!("{:?}", e);
        std::process::exit(1);
    }
}

async fn run(opts: opts::Opt) -> Result<()> {
    let icon = opts.icon()?;
    let mut builder = StatusNotifierItem::builder(&opts.id, opts.category)
        .bus_identity_policy(opts.identity)
        .icon(IconSlot::Main, icon.clone());
    if let Some(title) = &opts.title {
        builder = builder.title(title);
    }
    let (item, mut events) = builder.build();
    if let Some((title, body)) = opts.tooltip() {
        item.set_tooltip(icon, Some(title), body);
    }

    let mut state = item.watch_state();
    item.register();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => handle_event(&item, event),
                None => break,
            },
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                if current == RegistrationState::Failed {
                    anyhow::bail!("Giving up on registering {}", item.id());
                }
            },
            _ = tokio::signal::ctrl_c() => {
                log::info!("Shutting down");
                break;
            }
        }
    }

    item.release();
    Ok(())
}

fn handle_event(item: &StatusNotifierItem, event: Event) {
    match event {
        Event::Activate { x, y } => {
            log::info!("Activated at {}x{}", x, y);
            // toggle between asking for attention and not, so there's something to see
            let status = if item.status() == Status::NeedsAttention { Status::Active } else { Status::NeedsAttention };
            item.set_status(status);
        }
        Event::SecondaryActivate { x, y } => log::info!("Secondary activation at {}x{}", x, y),
        Event::ContextMenu { x, y } => log::info!("Context menu requested at {}x{}", x, y),
        Event::Scroll { delta, orientation } => log::info!("Scrolled {} {}", delta, orientation),
        Event::RegistrationFailed(e) if e.is_fatal() => log::error!("Registration failed: {}", e),
        Event::RegistrationFailed(e) => log::warn!("Not registered yet: {}", e),
    }
}
