mod classify;
mod cli;
mod config;
mod controller;
mod emitter;
mod frames;
mod geometry;
mod input;
mod ipc;
mod logging;
mod message;
mod motion;
mod sim;
mod tracker;
mod transport;
mod tween;

fn main() -> anyhow::Result<()> {
    logging::init();
    cli::run()
}
