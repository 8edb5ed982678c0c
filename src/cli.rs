use std::sync::OnceLock;
use clap::{
    Parser,
    builder::styling::{
        AnsiColor,
        Effects,
        Styles,
    },
};
use enum_dispatch::enum_dispatch;

use crate::{
    types::Result,
    commands::{
        phband::Phband,
        phdos::Phdos,
    },
};


pub fn get_style() -> Styles {
    static INSTANCE: OnceLock<Styles> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        Styles::styled()
            .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
            .usage(AnsiColor::Green.on_default()   | Effects::BOLD)
            .literal(AnsiColor::Green.on_default() | Effects::BOLD)
            .placeholder(AnsiColor::BrightBlue.on_default())
            .error(AnsiColor::BrightRed.on_default())
            .valid(AnsiColor::BrightYellow.on_default())
    }).to_owned()
}


#[enum_dispatch]
pub trait OptProcess {
    fn process(&self) -> Result<()>;
}


#[enum_dispatch(OptProcess)]
#[derive(Debug, Parser)]
#[command(name = "rsphon",
            about = "A command-line tool to inspect phonon band structures and DOS produced by ABINIT/anaddb.",
            version,
            styles = get_style()
            )]
enum Opt {
    Phband,

    Phdos,
}


pub fn run() -> Result<()> {
    Opt::parse().process()
}
