//! Synthetic SBS-1 feed for testing the pipeline without an antenna.
//!
//! Listens on 127.0.0.1:30003 (override with SIM_PORT) and streams generated
//! `MSG,3` position lines for a handful of drifting aircraft to every client.
//!
//!     cargo run -p adsb-feed --example simulate_feed

use std::time::Duration;

use rand::Rng;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

#[derive(Clone)]
struct SimAircraft {
    icao: String,
    callsign: String,
    lat: f64,
    lon: f64,
    altitude_ft: f64,
    speed_kts: f64,
    heading_deg: f64,
}

impl SimAircraft {
    fn random(idx: usize, center_lat: f64, center_lon: f64) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            icao: format!("D{:05X}", rng.gen_range(0..0xF_FFFF)),
            callsign: format!("DEMO{idx:02}"),
            lat: center_lat + rng.gen_range(-0.05..0.05),
            lon: center_lon + rng.gen_range(-0.05..0.05),
            altitude_ft: rng.gen_range(3_000.0..38_000.0),
            speed_kts: rng.gen_range(180.0..460.0),
            heading_deg: rng.gen_range(0.0..360.0),
        }
    }

    fn step(&mut self, dt_secs: f64) {
        let mut rng = rand::thread_rng();
        let distance_km = self.speed_kts * 1.852 / 3600.0 * dt_secs;
        let heading_rad = self.heading_deg.to_radians();
        self.lat += (distance_km / 111.0) * heading_rad.cos();
        self.lon += (distance_km / (111.0 * self.lat.to_radians().cos())) * heading_rad.sin();
        self.altitude_ft += rng.gen_range(-200.0..200.0);
        self.heading_deg = (self.heading_deg + rng.gen_range(-5.0..5.0)).rem_euclid(360.0);
    }

    fn sbs_line(&self) -> String {
        let now = chrono_free_timestamp();
        format!(
            "MSG,3,1,1,{},1,{now},{now},{},{:.0},{:.0},{:.0},{:.4},{:.4},,,0,0,0,0",
            self.icao,
            self.callsign,
            self.altitude_ft,
            self.speed_kts,
            self.heading_deg,
            self.lat,
            self.lon,
        )
    }
}

// SBS date/time pair without pulling a date dependency into the example;
// receivers ignore these fields anyway (the collector uses receipt time).
fn chrono_free_timestamp() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("1970/01/01,00:{:02}:{:02}.000", (secs / 60) % 60, secs % 60)
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let port: u16 = std::env::var("SIM_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(30003);
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    eprintln!("simulated SBS-1 feed on 127.0.0.1:{port}");

    loop {
        let (mut stream, peer) = listener.accept().await?;
        eprintln!("client connected: {peer}");

        tokio::spawn(async move {
            let mut fleet: Vec<SimAircraft> = (0..5)
                .map(|idx| SimAircraft::random(idx, 45.63, 8.93))
                .collect();

            loop {
                for aircraft in &mut fleet {
                    aircraft.step(1.0);
                    let line = aircraft.sbs_line() + "\n";
                    if stream.write_all(line.as_bytes()).await.is_err() {
                        eprintln!("client disconnected: {peer}");
                        return;
                    }
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        });
    }
}
