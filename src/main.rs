use std::fs::{self, File};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use tvgrid::controller::Controller;
use tvgrid::model::{Model, Status};
use tvgrid::route::SystemNavigator;
use tvgrid::source::{FileSource, Page};
use tvgrid::ui::TableUI;
use tvgrid::{
    ColumnSpec, DataSource, GridConfig, GridError, GridModel, GridState, SortMode, StdFormatter,
    TemplateRoutes, ViewModel, ViewModelBuilder,
};

#[derive(Parser, Debug)]
#[command(version, about = "A sortable, filterable data grid for tabular files.")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the grid as HTML with its client script
    Render {
        #[command(flatten)]
        grid: GridArgs,
        /// Output file, stdout if not given
        #[arg(short, long)]
        output: Option<String>,
        /// Only the grid markup and script, no surrounding document
        #[arg(long)]
        fragment: bool,
        /// Print the serialized initial state as JSON instead of HTML
        #[arg(long, conflicts_with = "fragment")]
        state: bool,
        /// Serve the unminified vue build
        #[arg(long)]
        dev: bool,
        /// Location vue is served from
        #[arg(long)]
        vue_src: Option<String>,
    },
    /// Browse the grid in the terminal
    View {
        #[command(flatten)]
        grid: GridArgs,
        /// Prepended to row action locations before they are opened
        #[arg(long)]
        base_url: Option<String>,
        /// Log file, defaults to tvgrid.log in the temp directory
        #[arg(long)]
        log: Option<String>,
    },
}

#[derive(Args, Debug)]
struct GridArgs {
    /// CSV, Parquet or Arrow IPC file
    path: String,
    /// Column as `attribute[:format[:label]]`, repeatable. All fields if not given
    #[arg(short, long = "column")]
    columns: Vec<String>,
    /// Initial sort column, the first column if not given
    #[arg(long)]
    sort_key: Option<String>,
    /// Field identifying a row in action links
    #[arg(long)]
    primary_key: Option<String>,
    /// Compare numbers in cells numerically instead of as text
    #[arg(long)]
    numeric_sort: bool,
    /// Id of the grid element
    #[arg(long, default_value = "w0")]
    id: String,
    /// Controller name used in action routes
    #[arg(long)]
    controller: Option<String>,
    /// Action route, `{controller}`, `{action}` and a trailing `{id}` are replaced
    #[arg(long)]
    route_template: Option<String>,
    #[arg(long)]
    no_filters: bool,
    #[arg(long)]
    no_actions: bool,
    /// Currency symbol of the currency format
    #[arg(long, default_value = "$")]
    currency: String,
    /// Page to show, zero based
    #[arg(long, default_value_t = 0, requires = "page_size")]
    page: usize,
    #[arg(long)]
    page_size: Option<usize>,
}

impl GridArgs {
    fn config(&self) -> GridConfig {
        let mut config = GridConfig::default()
            .with_id(self.id.as_str())
            .with_filter_fields(!self.no_filters)
            .with_action_column(!self.no_actions);
        if self.numeric_sort {
            config = config.with_sort_mode(SortMode::Numeric);
        }
        if let Some(key) = &self.sort_key {
            config = config.with_sort_key(key.as_str());
        }
        if let Some(pk) = &self.primary_key {
            config = config.with_primary_key(pk.as_str());
        }
        config
    }
}

fn expand_path(path: &str) -> Result<PathBuf, GridError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| GridError::LoadingFailed(format!("{path}: {e}")))
}

enum LogTarget {
    Stderr,
    File(File),
}

fn init_tracing(target: LogTarget) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default());
    match target {
        LogTarget::Stderr => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogTarget::File(file) => registry
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .init(),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(cli: Cli) -> Result<(), GridError> {
    match cli.command {
        Command::Render {
            grid,
            output,
            fragment,
            state,
            dev,
            vue_src,
        } => {
            init_tracing(LogTarget::Stderr);
            let mut config = grid.config().with_dev(dev);
            if let Some(src) = vue_src {
                config = config.with_vue_src(src);
            }
            let (vm, routes) = build(&grid, &config)?;
            let mut grid_state = GridState::initial(&vm);
            grid_state.sort_mode = config.sort_mode;

            let widget = tvgrid::html::GridWidget::new(&config, &routes);
            let rendered = if state {
                serde_json::to_string_pretty(&grid_state)?
            } else if fragment {
                widget.render(&grid_state)?
            } else {
                widget.render_page(&vm.name, &grid_state)?
            };

            match output {
                Some(path) => {
                    let path = expand_path(&path)?;
                    fs::write(&path, rendered)?;
                    info!("Wrote {}", path.display());
                }
                None => println!("{rendered}"),
            }
            Ok(())
        }
        Command::View {
            grid,
            base_url,
            log,
        } => {
            let log_path = match log {
                Some(path) => expand_path(&path)?,
                None => std::env::temp_dir().join("tvgrid.log"),
            };
            init_tracing(LogTarget::File(File::create(&log_path)?));

            let config = grid.config();
            let (vm, routes) = build(&grid, &config)?;
            let grid_model = GridModel::new(vm, Box::new(routes)).with_sort_mode(config.sort_mode);
            let navigator = SystemNavigator { base_url };

            let mut terminal = ratatui::init();
            let result = (|| -> Result<(), GridError> {
                let size = terminal.size()?;
                let mut model = Model::init(grid_model, &config, Box::new(navigator), size.height as usize);
                let ui = TableUI::new(&config);
                let controller = Controller::new(&config);

                while model.status != Status::QUITTING {
                    // Render the current view
                    terminal.draw(|f| ui.draw(&model, f))?;

                    // Handle events and map to a Message
                    if let Some(message) = controller.handle_event(&model)? {
                        model.update(Some(message))?;
                    };
                }
                Ok(())
            })();
            ratatui::restore();
            result
        }
    }
}

fn build(grid: &GridArgs, config: &GridConfig) -> Result<(ViewModel, TemplateRoutes), GridError> {
    let path = expand_path(&grid.path)?;
    let page = Page {
        index: grid.page,
        size: grid.page_size,
    };
    let source = FileSource::load(path, config.primary_key.as_deref(), page)?;

    let columns = if grid.columns.is_empty() {
        source
            .schema()
            .fields()
            .iter()
            .map(|f| ColumnSpec::field(f.name.as_str()))
            .collect::<Vec<ColumnSpec>>()
    } else {
        grid.columns
            .iter()
            .map(|c| c.parse::<ColumnSpec>())
            .collect::<Result<Vec<ColumnSpec>, GridError>>()?
    };

    let formatter = StdFormatter::default().with_currency_symbol(grid.currency.as_str());
    let vm = ViewModelBuilder::new(&formatter)
        .columns(columns)
        .sort_key(config.sort_key.clone())
        .primary_key(config.primary_key.clone())
        .build(&source)?;

    let controller = grid.controller.clone().unwrap_or_else(|| vm.name.clone());
    let mut routes = TemplateRoutes::new(controller);
    if let Some(template) = &grid.route_template {
        routes = routes.with_template(template.as_str())?;
    }
    Ok((vm, routes))
}
