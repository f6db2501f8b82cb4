use std::sync::Arc;
use std::time::Duration;
use position_stabilizer::{
    init_logging, MockFixSource, PositionSession, PositioningConfig, RawFix, SessionOptions, DEFAULT_LOG_FILTER,
};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Simulated driver waiting near Place de la Gare while GPS converges
const WAITING_FIXES: [(f64, f64, f64); 6] = [
    (-4.30352, 15.31748, 40.0),
    (-4.30354, 15.31751, 25.0),
    (-4.30351, 15.31749, 12.0),
    (-4.30353, 15.31750, 8.0),
    (-4.30352, 15.31752, 6.0),
    (-4.30353, 15.31751, 5.0),
];

#[tokio::main]
async fn main() {
    if let Err(e) = init_logging(DEFAULT_LOG_FILTER) {
        eprintln!("logging disabled: {}", e);
    }

    let config = match std::env::args().nth(1) {
        Some(path) => match PositioningConfig::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                error!(%path, error = %e, "cannot load configuration");
                std::process::exit(1);
            }
        },
        None => PositioningConfig::default(),
    };

    let source = Arc::new(MockFixSource::new());
    // Coarse network fix answers the fast request
    source.queue_fix(RawFix::new(-4.3036, 15.3176, 350.0, 0));

    let session = match PositionSession::new(source.clone(), config) {
        Ok(session) => session,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let (locked_tx, mut locked_rx) = mpsc::unbounded_channel();
    let options = SessionOptions::new(|position| match serde_json::to_string(&position) {
        Ok(json) => println!("{}", json),
        Err(e) => warn!(error = %e, "cannot serialize position"),
    })
    .on_accuracy_reached(move |position| {
        let _ = locked_tx.send(position);
    })
    .on_error(|kind| warn!(soft = kind.is_soft(), "{}", kind));

    if let Err(e) = session.start(options) {
        error!(error = %e, "cannot start session");
        std::process::exit(1);
    }
    source.wait_for_subscription().await;

    for (i, (latitude, longitude, accuracy)) in WAITING_FIXES.iter().enumerate() {
        let timestamp_ms = (i as i64 + 1) * 1000;
        if !source.emit(RawFix::new(*latitude, *longitude, *accuracy, timestamp_ms)) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    match tokio::time::timeout(Duration::from_secs(1), locked_rx.recv()).await {
        Ok(Some(position)) => info!(
            latitude = position.latitude,
            longitude = position.longitude,
            accuracy_m = position.accuracy_meters,
            "pickup position locked"
        ),
        _ => info!(state = ?session.lock_state(), "no lock reached"),
    }

    session.stop();
}
