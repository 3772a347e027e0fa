mod host;
mod mqtt;
#[cfg(feature = "rpi")]
mod rpi;
#[cfg(not(feature = "rpi"))]
mod sim;
mod thermal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
