//! Simulated driver: joins the convoy and reports a circular route.
//!
//! cargo run -p convoy_server --example driver -- 127.0.0.1:8000 Alice

use std::time::Duration;

use anyhow::Result;
use driver_hub::{ClientEvent, Metadata, PositionUpdate, ServerEvent};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::{net::TcpStream, select, time};
use tokio_util::codec::{Framed, LinesCodec};

const CENTER: (f64, f64) = (-3.73, -38.52);
const RADIUS_DEG: f64 = 0.01;

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let addr = args.next().unwrap_or_else(|| "127.0.0.1:8000".to_string());
    let name = args.next().unwrap_or_else(|| "Anonymous".to_string());

    let stream = TcpStream::connect(&addr).await?;
    let mut framed = Framed::new(stream, LinesCodec::new());

    let mut metadata = Metadata::new();
    metadata.insert("name".to_string(), json!(name));
    framed.send(serde_json::to_string(&ClientEvent::Join(metadata))?).await?;

    let mut ticker = time::interval(Duration::from_secs(1));
    let mut step = 0u32;
    loop {
        select! {
            _ = ticker.tick() => {
                let angle = f64::from(step) * 0.1;
                let update = PositionUpdate {
                    lat: CENTER.0 + RADIUS_DEG * angle.sin(),
                    lon: CENTER.1 + RADIUS_DEG * angle.cos(),
                    speed: 40.0 + 5.0 * angle.sin(),
                };
                framed.send(serde_json::to_string(&ClientEvent::UpdatePosition(update))?).await?;
                step += 1;
            }
            line = framed.next() => {
                let Some(line) = line else {
                    println!("server closed the connection");
                    return Ok(());
                };
                match serde_json::from_str::<ServerEvent>(&line?)? {
                    ServerEvent::AllDrivers(drivers) => {
                        println!("{} drivers on the road", drivers.len());
                    }
                    ServerEvent::DriverMoved(driver) => {
                        println!("{} at ({:.5}, {:.5}) speed {:?}", driver.id, driver.lat, driver.lon, driver.speed);
                    }
                    ServerEvent::DriverLeft(id) => println!("{} left", id),
                    ServerEvent::Error(report) => println!("rejected: {}", report.message),
                }
            }
        }
    }
}
