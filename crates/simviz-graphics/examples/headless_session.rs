//! Drive a full window lifecycle against the headless toolkit.
//!
//! Run with `SIMVIZ_LOG=debug` to watch the rendering thread work, and
//! `SIMVIZ_GRAPHICS_BLOCKING=1` to run the same session inline.

use simviz_graphics::{
    DrawableKind, GraphicsConfig, GraphicsObject, HeadlessToolkit, SessionId, WindowManager,
};
use simviz_logging::{init_logging, LoggingOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _guard = init_logging(LoggingOptions {
        stderr: true,
        default_filter: Some("info".to_string()),
    });

    let config = GraphicsConfig::load()?;
    let manager = WindowManager::new(HeadlessToolkit::new(), config)?;
    println!("presentation mode: {}", manager.mode());

    let session = SessionId::new("cavity");
    let mesh = GraphicsObject::new(DrawableKind::Mesh, "cavity mesh")
        .with_session(session.clone())
        .into_ref();
    let residuals = GraphicsObject::new(DrawableKind::XyPlot, "residuals")
        .with_session(session.clone())
        .into_ref();

    let mesh_window = manager.plot(mesh, None)?;
    let residual_window = manager.plot(residuals, None)?;
    println!("opened {mesh_window} and {residual_window}");

    for step in 0..3 {
        let refreshed = manager.refresh_windows(Some(&session), None)?;
        println!("step {step}: refreshed {} window(s)", refreshed.len());
    }

    if manager.capabilities().frame_capture {
        manager.animate_windows(None, Some(&[residual_window.clone()]))?;
        manager.refresh_windows(None, Some(&[residual_window.clone()]))?;
    }

    let png = manager.save_graphic(&mesh_window, "png")?;
    println!("saved {}", png.display());

    manager.close_windows(Some(&session), None)?;
    manager.flush()?;
    println!("health: {:?}", manager.health());

    manager.shutdown()?;
    Ok(())
}
