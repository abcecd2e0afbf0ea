use std::path::PathBuf;

use overlay_input::input_hooks::input_hooks;
use overlay_input::logging;
use overlay_input::settings::HookSettings;

fn main() -> anyhow::Result<()> {
    let settings_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("hook_settings.json"));
    let settings = HookSettings::load(&settings_path)?;
    logging::init(settings.debug_logging, settings.log_file.as_deref());

    let hooks = input_hooks();
    hooks.mouse().register_handler(|event| {
        tracing::info!(action = ?event.action, x = event.x, y = event.y, "mouse");
        false
    });
    hooks.keyboard().register_handler(|event| {
        tracing::info!(action = ?event.action, vk = event.vk_code, system = event.system, "keyboard");
        false
    });

    if let Err(err) = hooks.apply_settings(&settings) {
        tracing::error!(%err, "failed to apply hook settings");
    }
    tracing::info!(status = %hooks.status(), "press Enter to exit");

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    hooks.shutdown();
    tracing::info!(status = %hooks.status(), "hooks removed");
    Ok(())
}
