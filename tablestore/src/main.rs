use tablestore::config::StoreConfig;
use tablestore::storage::{DataType, RowId, TableTree, TreeError, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Columns of the load-test table.
const COLUMNS: [DataType; 8] = [DataType::BigInt; 8];

const USAGE: &str = "usage: tablestore <table> <rows>";

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tablestore=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(table_name), Some(rows), None) = (args.next(), args.next(), args.next()) else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };
    let rows: u32 = match rows.parse() {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("invalid row count '{rows}': {e}\n{USAGE}");
            std::process::exit(2);
        }
    };

    // Load configuration from environment variables
    let config = match StoreConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!(
        "Loaded configuration: data_directory={}",
        config.data_directory.display()
    );

    if let Err(e) = load(&config, &table_name, rows) {
        tracing::error!("Load failed ({:?}): {e}", e.kind());
        std::process::exit(1);
    }
}

/// Append `rows` generated rows to the table and report its shape.
fn load(config: &StoreConfig, table_name: &str, rows: u32) -> Result<(), TreeError> {
    let path = config.table_path(table_name, false);
    let mut table = TableTree::open_or_create(&path, &COLUMNS)?;

    for _ in 0..rows {
        let row_id = table.row_id_counter();
        table.insert(COLUMNS.to_vec(), row_values(row_id))?;
    }
    table.sync()?;

    tracing::info!(
        "Table {table_name}: next row id {}, height {}, {} pages",
        table.row_id_counter(),
        table.height()?,
        table.page_count()
    );
    Ok(())
}

fn row_values(row_id: RowId) -> Vec<Value> {
    (0..8)
        .map(|column| Value::BigInt(i64::from(row_id) * 8 + column))
        .collect()
}
