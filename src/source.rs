use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::GridError;
use crate::schema::{DataSource, FieldDef, Record, Schema, humanize};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
pub struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

/// Which slice of the file makes up the current page.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Page {
    pub index: usize,
    pub size: Option<usize>,
}

impl Page {
    // Row offset and length of the page as polars wants them.
    fn bounds(&self, size: usize) -> Result<(i64, IdxSize), GridError> {
        let too_large = || {
            GridError::LoadingFailed(format!("page {} of size {size} is out of range", self.index))
        };
        let offset = self
            .index
            .checked_mul(size)
            .and_then(|o| i64::try_from(o).ok())
            .ok_or_else(too_large)?;
        let len = IdxSize::try_from(size).map_err(|_| too_large())?;
        Ok((offset, len))
    }
}

/// Records of a CSV, Parquet or Arrow IPC file.
///
/// Field labels are derived from the column names (`unit_price` -> `Unit Price`). The primary key
/// is the given field, else an `id` column, else the first column.
#[derive(Debug)]
pub struct FileSource {
    name: String,
    schema: Schema,
    records: Vec<Record>,
}

impl FileSource {
    pub fn load(path: PathBuf, primary_key: Option<&str>, page: Page) -> Result<Self, GridError> {
        let file_info = Self::get_file_info(path)?;
        debug!("Loading {:?}", file_info);
        let frame = match file_info.file_type {
            FileType::CSV => Self::load_csv(&file_info.path)?,
            FileType::PARQUET => Self::load_parquet(&file_info.path)?,
            FileType::ARROW => Self::load_arrow(&file_info.path)?,
        };
        let frame = match page.size {
            Some(size) => {
                let (offset, len) = page.bounds(size)?;
                frame.slice(offset, len)
            }
            None => frame,
        };

        // Each column is converted in its own thread.
        let start_time = Instant::now();
        let df = frame.collect()?;
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        let columns = names
            .par_iter()
            .map(|name| Self::load_column(&df, name))
            .collect::<Result<Vec<Vec<Value>>, PolarsError>>()?;

        let records = Self::transpose(columns, df.height());
        info!(
            "Loading {} rows from {} bytes took {}ms ...",
            records.len(),
            file_info.file_size,
            start_time.elapsed().as_millis()
        );

        let primary_key = match primary_key {
            Some(pk) => Some(pk.to_string()),
            None if names.iter().any(|n| n == "id") => Some("id".to_string()),
            None => names.first().cloned(),
        };
        let fields = names
            .iter()
            .map(|n| FieldDef::labeled(n.as_str(), humanize(n)))
            .collect();
        let mut schema = Schema::new(fields);
        if let Some(pk) = primary_key {
            schema = schema.with_primary_key(pk);
        }

        let name = file_info
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string();

        Ok(Self {
            name,
            schema,
            records,
        })
    }

    fn transpose(columns: Vec<Vec<Value>>, nrows: usize) -> Vec<Record> {
        let mut rows: Vec<Vec<Value>> = (0..nrows)
            .map(|_| Vec::with_capacity(columns.len()))
            .collect();
        for column in columns {
            for (row, value) in rows.iter_mut().zip(column) {
                row.push(value);
            }
        }
        rows.into_iter().map(Record::new).collect()
    }

    fn load_column(df: &DataFrame, col_name: &str) -> Result<Vec<Value>, PolarsError> {
        let column = df.column(col_name)?;
        let dtype = column.dtype().clone();

        let values = if dtype.is_bool() {
            column.bool()?.into_iter().map(Value::from).collect()
        } else if dtype.is_integer() {
            let col = column.cast(&DataType::Int64)?;
            col.i64()?.into_iter().map(Value::from).collect()
        } else if dtype.is_float() {
            let col = column.cast(&DataType::Float64)?;
            col.f64()?.into_iter().map(Value::from).collect()
        } else {
            let col = column.cast(&DataType::String)?;
            col.str()?
                .into_iter()
                .map(|v| match v {
                    Some(s) => Value::Str(s.replace("\r\n", " ↵ ").replace('\n', " ↵ ")),
                    None => Value::Null,
                })
                .collect()
        };
        Ok(values)
    }

    fn detect_file_type(path: &Path) -> Result<FileType, GridError> {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase())
            .as_deref()
        {
            Some("CSV") => Ok(FileType::CSV),
            Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
            Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
            _ => Err(GridError::UnknownFileType),
        }
    }

    fn get_file_info(path: PathBuf) -> Result<FileInfo, GridError> {
        let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => GridError::FileNotFound,
            ErrorKind::PermissionDenied => GridError::PermissionDenied,
            _ => GridError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(GridError::LoadingFailed("Not a file!".into()));
        }

        let file_type = Self::detect_file_type(&path)?;

        Ok(FileInfo {
            path,
            file_size: metadata.len(),
            file_type,
        })
    }

    fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyCsvReader::new(PlPath::Local(path.into()))
            .with_has_header(true)
            .finish()
    }

    fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
    }

    fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_ipc(
            PlPath::Local(path.into()),
            polars::io::ipc::IpcScanOptions,
            UnifiedScanArgs::default(),
        )
    }
}

impl DataSource for FileSource {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn records(&self) -> &[Record] {
        &self.records
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_typed_csv_columns() {
        let file = csv("id,name,unit_price,active\n1,Bob,10.5,true\n2,Al,20,false\n");
        let source = FileSource::load(file.path().to_path_buf(), None, Page::default()).unwrap();

        let schema = source.schema();
        assert_eq!(schema.primary_key(), Some("id"));
        assert_eq!(schema.label("unit_price").as_deref(), Some("Unit Price"));

        let records = source.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get(0), &Value::Int(1));
        assert_eq!(records[0].get(1), &Value::from("Bob"));
        assert_eq!(records[1].get(2), &Value::Float(20.0));
        assert_eq!(records[1].get(3), &Value::Bool(false));
    }

    #[test]
    fn page_slices_the_rows() {
        let file = csv("sku,name\na,A\nb,B\nc,C\n");
        let page = Page {
            index: 1,
            size: Some(2),
        };
        let source = FileSource::load(file.path().to_path_buf(), None, page).unwrap();
        assert_eq!(source.schema().primary_key(), Some("sku"));
        assert_eq!(source.records().len(), 1);
        assert_eq!(source.records()[0].get(0), &Value::from("c"));
    }

    #[test]
    fn huge_pages_are_an_error() {
        let file = csv("sku,name\na,A\n");
        let page = Page {
            index: usize::MAX,
            size: Some(2),
        };
        let err = FileSource::load(file.path().to_path_buf(), None, page).unwrap_err();
        assert!(matches!(err, GridError::LoadingFailed(_)));

        let page = Page {
            index: 1,
            size: Some(usize::MAX),
        };
        assert!(matches!(page.bounds(usize::MAX), Err(GridError::LoadingFailed(_))));
        assert_eq!(Page::default().bounds(10).unwrap(), (0, 10));
    }

    #[test]
    fn rejects_unknown_files() {
        let err = FileSource::load("does/not/exist.csv".into(), None, Page::default()).unwrap_err();
        assert!(matches!(err, GridError::FileNotFound));

        let file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        let err = FileSource::load(file.path().to_path_buf(), None, Page::default()).unwrap_err();
        assert!(matches!(err, GridError::UnknownFileType));
    }
}
