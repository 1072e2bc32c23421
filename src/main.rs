mod ui;

use std::sync::Arc;

use wavescope::settings::{ScopeSettings, default_settings_path};
use wavescope::{RenderLoop, Result, WaveformGenerator};

use ui::ScopeApp;

fn build_pipeline(settings: &mut ScopeSettings) -> Result<(Arc<WaveformGenerator>, RenderLoop)> {
    let queue = Arc::new(settings.build_queue()?);
    let generator = WaveformGenerator::new(settings.generator_config()?, Arc::clone(&queue))?;
    settings.apply_to(&generator);

    let scope =
        RenderLoop::new(queue, settings.ring_capacity).with_diagnostics(settings.diagnostics);
    Ok((Arc::new(generator), scope))
}

fn main() -> eframe::Result<()> {
    env_logger::init();

    let settings_path = default_settings_path();
    let mut settings = ScopeSettings::load(&settings_path);

    let (generator, scope) = build_pipeline(&mut settings)
        .or_else(|err| {
            log::warn!("invalid settings ({err}), falling back to defaults");
            settings = ScopeSettings::default();
            build_pipeline(&mut settings)
        })
        .expect("Default pipeline settings are valid");

    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "Oscilloscope",
        options,
        Box::new(move |cc| {
            Box::new(ScopeApp::new(
                cc,
                generator,
                scope,
                settings_path,
                settings,
            ))
        }),
    )
}
