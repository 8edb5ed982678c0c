use std::fs;
use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use log::info;
use serde::{
    Deserialize,
    Serialize,
};

use crate::abinit_parsers::phbst::PhbstFile;
use crate::cli::OptProcess;
use crate::commands::common::write_array_to_txt;
use crate::types::{
    Result,
    Vector,
};

/// Maximum half-stripe width of the fatbands, in eV (3 meV).
const MAX_STRIPE_WIDTH_EV: f64 = 3.0e-3;


#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SmearingConfig {
    pub method: String,
    pub step:   f64,
    pub width:  f64,
}

impl Default for SmearingConfig {
    fn default() -> Self {
        Self {
            method: "gaussian".to_string(),
            step:   1.0e-4,
            width:  4.0e-4,
        }
    }
}


#[derive(Debug, Args)]
/// Plot the phonon band structure stored in a PHBST file.
///
/// Optionally draws per-species fatband stripes (stripe width proportional
/// to the squared displacement carried by the atoms of that species) and,
/// when the file holds a full Brillouin-zone q-mesh, derives a
/// Gaussian-smeared phonon DOS from the band frequencies.
pub struct Phband {
    #[arg(default_value = "./run_PHBST.nc")]
    /// PHBST file name.
    phbst: PathBuf,

    #[arg(short, long)]
    /// Print a brief summary of the band structure and exit.
    list: bool,

    #[arg(long)]
    /// Draw fatband stripes for each chemical species.
    fatbands: bool,

    #[arg(long)]
    /// Also compute a smeared DOS; requires q-point weights summing to one.
    with_dos: bool,

    #[arg(short, long)]
    /// Smearing settings in TOML format, overriding --method/--step/--width.
    config: Option<PathBuf>,

    #[arg(long, default_value = "gaussian")]
    /// Broadening method used for the DOS.
    method: String,

    #[arg(long, default_value_t = 1.0e-4)]
    /// Energy step of the DOS mesh, in eV.
    step: f64,

    #[arg(long, default_value_t = 4.0e-4)]
    /// Standard deviation of the Gaussian smearing, in eV.
    width: f64,

    #[arg(long, default_value = "phband.txt")]
    /// Write the raw band frequencies to this text file.
    txtout: PathBuf,

    #[arg(long, default_value = "phband.html")]
    /// Write the rendered band plot to this html file.
    htmlout: PathBuf,

    #[arg(long, default_value = "phband_dos.txt")]
    /// Write the derived DOS to this text file (with --with-dos).
    dos_txtout: PathBuf,

    #[arg(long, default_value = "phband_dos.html")]
    /// Write the derived DOS plot to this html file (with --with-dos).
    dos_htmlout: PathBuf,

    #[arg(long)]
    /// Open the browser and show the plot immediately.
    show: bool,

    #[arg(long)]
    /// Render the plot and print the rendered code to stdout.
    to_inline_html: bool,
}


impl OptProcess for Phband {
    fn process(&self) -> Result<()> {
        info!("Reading phonon band structure from {:?}", &self.phbst);
        let phbst = PhbstFile::from_file(&self.phbst)?;
        let bands = phbst.phbands();

        if self.list {
            println!("{}", "---- phonon band structure ----".bright_green().bold());
            print!("{}", bands);
            return Ok(());
        }

        let (nqpts, nbranches) = bands.shape();
        let xdat = Vector::<f64>::linspace(0.0, (nqpts - 1) as f64, nqpts);

        let mut plot = plotly::Plot::new();
        for nu in 0 .. nbranches {
            let trace = plotly::Scatter::from_array(xdat.clone(),
                                                    bands.phfreqs().column(nu).to_owned())
                .mode(plotly::common::Mode::Lines)
                .name(&format!("branch {}", nu))
                .show_legend(false);
            plot.add_trace(trace);
        }

        if self.fatbands {
            let d2_total = bands.displ_norm2();
            for symbol in bands.structure().ion_types().to_vec() {
                let d2_type = bands.displ_norm2_of_species(&symbol)?;

                for nu in 0 .. nbranches {
                    let y = bands.phfreqs().column(nu).to_owned();
                    let stripe = Vector::from_iter((0 .. nqpts).map(|iq| {
                        let tot = d2_total[[iq, nu]];
                        if tot > 0.0 {
                            MAX_STRIPE_WIDTH_EV * d2_type[[iq, nu]] / (2.0 * tot)
                        } else {
                            0.0
                        }
                    }));

                    let upper = plotly::Scatter::from_array(xdat.clone(), &y + &stripe)
                        .mode(plotly::common::Mode::Lines)
                        .name(&symbol)
                        .show_legend(nu == 0);
                    let lower = plotly::Scatter::from_array(xdat.clone(), &y - &stripe)
                        .mode(plotly::common::Mode::Lines)
                        .name(&symbol)
                        .show_legend(false);
                    plot.add_trace(upper);
                    plot.add_trace(lower);
                }
            }
        }

        let layout = plotly::Layout::new()
            .title(plotly::common::Title::new(
                    &format!("Phonon Band Structure of {}", bands.structure().formula())))
            .y_axis(plotly::layout::Axis::new()
                    .title(plotly::common::Title::new("Frequency (eV)"))
                    .zero_line(true))
            .x_axis(plotly::layout::Axis::new()
                    .title(plotly::common::Title::new("q-point index")));
        plot.set_layout(layout);

        info!("Writing to {:?}", &self.htmlout);
        plot.write_html(&self.htmlout);

        if self.show {
            plot.show();
        }
        if self.to_inline_html {
            info!("Printing inline html to stdout ...");
            println!("{}", plot.to_inline_html(None));
        }

        let branch_columns = (0 .. nbranches)
            .map(|nu| bands.phfreqs().column(nu).to_owned())
            .collect::<Vec<Vector<f64>>>();
        let data_ref = std::iter::once(&xdat)
            .chain(branch_columns.iter())
            .collect::<Vec<&Vector<f64>>>();
        info!("Writing to {:?}", &self.txtout);
        write_array_to_txt(&self.txtout, data_ref, "iqpt freqs(eV) per branch")?;

        if self.with_dos {
            let config = self.smearing_config()?;
            info!("Computing phonon DOS: method = {:?}, step = {} eV, width = {} eV",
                  config.method, config.step, config.width);
            let phdos = bands.get_phdos(&config.method, config.step, config.width)?;

            let mut dos_plot = plotly::Plot::new();
            dos_plot.add_trace(
                plotly::Scatter::from_array(phdos.mesh().clone(), phdos.values().clone())
                    .mode(plotly::common::Mode::Lines)
                    .name("DOS"));
            dos_plot.add_trace(
                plotly::Scatter::from_array(phdos.mesh().clone(), phdos.idos().values().clone())
                    .mode(plotly::common::Mode::Lines)
                    .name("IDOS"));
            let dos_layout = plotly::Layout::new()
                .title(plotly::common::Title::new("Phonon DOS"))
                .y_axis(plotly::layout::Axis::new()
                        .title(plotly::common::Title::new("DOS (states/eV)")))
                .x_axis(plotly::layout::Axis::new()
                        .title(plotly::common::Title::new("Frequency (eV)")));
            dos_plot.set_layout(dos_layout);

            info!("Writing to {:?}", &self.dos_htmlout);
            dos_plot.write_html(&self.dos_htmlout);

            info!("Writing to {:?}", &self.dos_txtout);
            write_array_to_txt(&self.dos_txtout,
                               vec![phdos.mesh(), phdos.values(), phdos.idos().values()],
                               "freq(eV) dos(states/eV) idos(states)")?;
        }

        Ok(())
    }
}

impl Phband {
    fn smearing_config(&self) -> Result<SmearingConfig> {
        if let Some(path) = &self.config {
            info!("Reading smearing settings from {:?}", path);
            Ok(toml::from_str(&fs::read_to_string(path)?)?)
        } else {
            Ok(SmearingConfig {
                method: self.method.clone(),
                step:   self.step,
                width:  self.width,
            })
        }
    }
}
