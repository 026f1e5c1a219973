#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use std::fs;
    use std::path::{Path, PathBuf};

    use clap::{Parser, Subcommand};
    use geo_converter::config::ConverterConfig;
    use geo_converter::logging::init_logging;
    use geo_converter::service::{
        ConverterService, Upload, UploadForm, DBF_FIELD, PRJ_FIELD, SHP_FIELD, WORKBOOK_FIELD,
    };

    #[derive(Parser, Debug)]
    #[command(name = "geoconvert")]
    #[command(about = "Convert UTM spreadsheets and shapefiles to WGS84", long_about = None)]
    pub struct Args {
        /// Path to TOML configuration file
        #[arg(short, long, global = true)]
        config: Option<PathBuf>,

        /// Enable debug logging
        #[arg(short, long, global = true)]
        verbose: bool,

        #[command(subcommand)]
        command: Command,
    }

    #[derive(Subcommand, Debug)]
    enum Command {
        /// Add latitud/longitud columns to a workbook with x, y, zona and Hemisferio
        Utm {
            input: PathBuf,

            /// Output workbook (defaults to coordenadas_convertidas.xlsx next to the input)
            #[arg(short, long)]
            output: Option<PathBuf>,
        },

        /// Convert a shapefile to GeoJSON in the configured output directory
        Shapefile {
            input: PathBuf,

            /// Attribute table (defaults to the sibling .dbf when present)
            #[arg(long)]
            dbf: Option<PathBuf>,

            /// Projection file (defaults to the sibling .prj when present)
            #[arg(long)]
            prj: Option<PathBuf>,
        },
    }

    pub fn run() -> Result<(), Box<dyn std::error::Error>> {
        let args = Args::parse();

        let mut config = ConverterConfig::load(args.config.as_deref())?;
        if args.verbose {
            config.logging.level = "debug".to_string();
        }
        init_logging(&config.logging)?;

        let service = ConverterService::new(&config);
        match args.command {
            Command::Utm { input, output } => {
                let form = UploadForm::new().with(read_upload(WORKBOOK_FIELD, &input)?);
                let response = service.convert_coordinates(&form)?;

                let output = output.unwrap_or_else(|| {
                    input
                        .parent()
                        .unwrap_or_else(|| Path::new("."))
                        .join(&response.file_name)
                });
                fs::write(&output, &response.bytes)?;
                tracing::info!("Wrote {}", output.display());
            }
            Command::Shapefile { input, dbf, prj } => {
                let mut form = UploadForm::new().with(read_upload(SHP_FIELD, &input)?);
                if let Some(path) = dbf.or_else(|| sibling(&input, "dbf")) {
                    form.add(read_upload(DBF_FIELD, &path)?);
                }
                if let Some(path) = prj.or_else(|| sibling(&input, "prj")) {
                    form.add(read_upload(PRJ_FIELD, &path)?);
                }

                let response = service.convert_shapefile(&form)?;
                println!("{}", serde_json::to_string_pretty(&response)?);
            }
        }

        Ok(())
    }

    fn read_upload(field: &str, path: &Path) -> std::io::Result<Upload> {
        let bytes = fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Upload::new(field, &file_name, bytes))
    }

    fn sibling(path: &Path, extension: &str) -> Option<PathBuf> {
        let candidate = path.with_extension(extension);
        candidate.is_file().then_some(candidate)
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> std::process::ExitCode {
    match cli::run() {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("geoconvert: {}", e);
            std::process::ExitCode::FAILURE
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}
