mod model;
mod session;

use alloy_primitives::Bytes;

#[allow(unused)]
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

pub(crate) fn bytes(data: &[u8]) -> Bytes {
    Bytes::from(data.to_vec())
}

fn main() {}
