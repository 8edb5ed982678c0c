use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use log::info;

use crate::abinit_parsers::phdos::PhdosFile;
use crate::cli::OptProcess;
use crate::commands::common::write_array_to_txt;
use crate::types::{
    Result,
    Vector,
};


#[derive(Debug, Args)]
/// Plot the phonon DOS stored in a PHDOS file.
///
/// The per-species projected DOSes are drawn as a stacked set of curves
/// below the total DOS, like the pjdos plots produced by anaddb
/// post-processors.
pub struct Phdos {
    #[arg(default_value = "./run_PHDOS.nc")]
    /// PHDOS file name.
    phdos: PathBuf,

    #[arg(short, long)]
    /// Print a brief summary of the DOS file and exit.
    list: bool,

    #[arg(long, default_value = "phdos.txt")]
    /// Write the DOS columns to this text file.
    txtout: PathBuf,

    #[arg(long, default_value = "phdos.html")]
    /// Write the rendered plot to this html file.
    htmlout: PathBuf,

    #[arg(long)]
    /// Open the browser and show the plot immediately.
    show: bool,

    #[arg(long)]
    /// Render the plot and print the rendered code to stdout.
    to_inline_html: bool,
}


impl OptProcess for Phdos {
    fn process(&self) -> Result<()> {
        info!("Reading phonon DOS from {:?}", &self.phdos);
        let phdos_file = PhdosFile::from_file(&self.phdos)?;
        let total = phdos_file.phdos();

        if self.list {
            println!("{}", "---- phonon DOS ----".bright_green().bold());
            println!("formula      : {}", phdos_file.structure().formula());
            println!("mesh points  : {}", total.mesh().len());
            println!("total states : {:.3}", total.num_states());
            return Ok(());
        }

        let mut plot = plotly::Plot::new();

        // Stacked per-species projected DOSes.
        let mut cumulative = Vector::<f64>::zeros(total.mesh().len());
        for (symbol, pjdos) in phdos_file.pjdos_type_map().iter() {
            cumulative += pjdos.values();
            let trace = plotly::Scatter::from_array(total.mesh().clone(), cumulative.clone())
                .mode(plotly::common::Mode::Lines)
                .name(symbol);
            plot.add_trace(trace);
        }

        plot.add_trace(
            plotly::Scatter::from_array(total.mesh().clone(), total.values().clone())
                .mode(plotly::common::Mode::Lines)
                .name("Total DOS"));
        plot.add_trace(
            plotly::Scatter::from_array(total.mesh().clone(), total.idos().values().clone())
                .mode(plotly::common::Mode::Lines)
                .name("IDOS"));

        let layout = plotly::Layout::new()
            .title(plotly::common::Title::new(
                    &format!("Phonon DOS of {}", phdos_file.structure().formula())))
            .y_axis(plotly::layout::Axis::new()
                    .title(plotly::common::Title::new("DOS (states/eV)")))
            .x_axis(plotly::layout::Axis::new()
                    .title(plotly::common::Title::new("Frequency (eV)")));
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

        let species_columns = phdos_file.pjdos_type_map()
            .values()
            .map(|pjdos| pjdos.values())
            .collect::<Vec<&Vector<f64>>>();
        let comment = format!("freq(eV) total idos {}",
                              phdos_file.pjdos_type_map()
                                  .keys()
                                  .cloned()
                                  .collect::<Vec<String>>()
                                  .join(" "));
        let data_ref = vec![total.mesh(), total.values(), total.idos().values()]
            .into_iter()
            .chain(species_columns)
            .collect::<Vec<&Vector<f64>>>();

        info!("Writing to {:?}", &self.txtout);
        write_array_to_txt(&self.txtout, data_ref, &comment)?;

        Ok(())
    }
}
