use polars::prelude::*;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::TVError;
use crate::table::columns::INDEX_COLUMN;
use crate::types::{FieldSpec, FieldType, Spec};

pub const ID_COLUMN: &str = "id";
const PARENT_COLUMNS: [&str; 2] = ["_parent", "parent_id"];
const ADDED_COLUMN: &str = "_added";
const SOURCE_COLUMN: &str = "_source";

/// String columns with at most this many distinct values become categories.
pub const MAX_CATEGORY_VOCAB: usize = 20;
/// String columns with a longer average length are treated as free text.
pub const TEXT_SEGMENT_MIN_LEN: usize = 40;
/// List columns longer than this on average are treated as embeddings.
const MAX_TOKEN_LIST_LEN: usize = 64;

#[derive(Debug)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<CellValue>),
}

impl CellValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(b) => Some(*b),
            CellValue::Text(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" | "" => Some(false),
                _ => None,
            },
            CellValue::Number(n) => Some(*n != 0.0),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputMeta {
    pub parent_id: Option<String>,
    /// Set for rows that were generated rather than part of the source data.
    pub added: bool,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexedInput {
    pub id: String,
    pub data: BTreeMap<String, CellValue>,
    pub meta: InputMeta,
}

impl IndexedInput {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: BTreeMap::new(),
            meta: InputMeta::default(),
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: CellValue) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.meta.parent_id = Some(parent.into());
        self
    }

    pub fn added(mut self) -> Self {
        self.meta.added = true;
        self
    }
}

/// A column as read from disk, before reserved columns are split off.
#[derive(Debug, Clone)]
pub struct LoadedColumn {
    pub name: String,
    pub dtype: DataType,
    pub values: Vec<CellValue>,
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub name: String,
    pub spec: Spec,
    pub inputs: Vec<IndexedInput>,
}

/// Model outputs keyed by example id, as loaded from a predictions file.
#[derive(Debug, Clone)]
pub struct Predictions {
    pub model: String,
    pub columns: Vec<PredictionColumn>,
}

#[derive(Debug, Clone)]
pub struct PredictionColumn {
    pub name: String,
    pub spec: FieldSpec,
    pub values: HashMap<String, CellValue>,
}

pub fn expand_path(path: &str) -> Result<PathBuf, TVError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| TVError::LoadingFailed(format!("cannot expand {path}: {e}")))
}

pub fn load_dataset(path: &Path) -> Result<Dataset, TVError> {
    let name = file_stem(path);
    let columns = load_columns(path)?;
    Ok(Dataset::from_columns(name, columns))
}

pub fn load_predictions(path: &Path) -> Result<Predictions, TVError> {
    let model = file_stem(path);
    let columns = load_columns(path)?;
    Predictions::from_columns(model, columns)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("???")
        .to_string()
}

fn load_columns(path: &Path) -> Result<Vec<LoadedColumn>, TVError> {
    let file_info = get_file_info(path.to_path_buf())?;
    debug!(
        "Loading {:?} ({} bytes) as {:?}",
        file_info.path, file_info.file_size, file_info.file_type
    );
    let frame = match file_info.file_type {
        FileType::CSV => load_csv(&file_info.path)?,
        FileType::PARQUET => load_parquet(&file_info.path)?,
        FileType::ARROW => load_arrow(&file_info.path)?,
    };

    // Every column is converted in its own rayon task.
    let start_time = Instant::now();
    let df = Arc::new(frame.collect()?);
    let columns: Result<Vec<LoadedColumn>, PolarsError> = df
        .get_column_names()
        .par_iter()
        .map(|name| load_column(&df, name))
        .collect();
    let columns = columns?;
    info!(
        "Loading {} columns x {} rows took {}ms ...",
        columns.len(),
        df.height(),
        start_time.elapsed().as_millis()
    );
    Ok(columns)
}

fn load_column(df: &DataFrame, col_name: &str) -> Result<LoadedColumn, PolarsError> {
    let column = df.column(col_name)?;
    let dtype = column.dtype().clone();

    let values = if dtype.is_bool() {
        column
            .bool()?
            .into_iter()
            .map(|v| v.map_or(CellValue::Null, CellValue::Bool))
            .collect()
    } else if dtype.is_integer() || dtype.is_float() {
        let casted = column.cast(&DataType::Float64)?;
        casted
            .f64()?
            .into_iter()
            .map(|v| v.map_or(CellValue::Null, CellValue::Number))
            .collect()
    } else if let DataType::List(_) = dtype {
        let mut values = Vec::with_capacity(column.len());
        for item in column.list()?.into_iter() {
            values.push(match item {
                Some(series) => CellValue::List(series_to_values(&series)?),
                None => CellValue::Null,
            });
        }
        values
    } else {
        let casted = column.cast(&DataType::String)?;
        casted
            .str()?
            .into_iter()
            .map(|v| v.map_or(CellValue::Null, |s| CellValue::Text(s.to_string())))
            .collect()
    };

    Ok(LoadedColumn {
        name: col_name.to_string(),
        dtype,
        values,
    })
}

fn series_to_values(series: &Series) -> Result<Vec<CellValue>, PolarsError> {
    if series.dtype().is_integer() || series.dtype().is_float() {
        let casted = series.cast(&DataType::Float64)?;
        Ok(casted
            .f64()?
            .into_iter()
            .map(|v| v.map_or(CellValue::Null, CellValue::Number))
            .collect())
    } else {
        let casted = series.cast(&DataType::String)?;
        Ok(casted
            .str()?
            .into_iter()
            .map(|v| v.map_or(CellValue::Null, |s| CellValue::Text(s.to_string())))
            .collect())
    }
}

impl Dataset {
    pub fn new(name: impl Into<String>, spec: Spec, inputs: Vec<IndexedInput>) -> Self {
        let mut dataset = Self {
            name: name.into(),
            spec,
            inputs,
        };
        dataset.rename_field(INDEX_COLUMN);
        dataset
    }

    /// Moves a field out of the way of a synthetic table column of the same name.
    fn rename_field(&mut self, taken: &str) {
        if self.spec.get(taken).is_none() {
            return;
        }
        let mut renamed = format!("{taken}_");
        while self.spec.get(&renamed).is_some() {
            renamed.push('_');
        }
        warn!("Field {taken} of {} is shown as {renamed}", self.name);
        self.spec = self
            .spec
            .iter()
            .map(|(n, fs)| {
                let n = if n == taken { renamed.clone() } else { n.to_string() };
                (n, fs.clone())
            })
            .collect();
        for input in &mut self.inputs {
            if let Some(value) = input.data.remove(taken) {
                input.data.insert(renamed.clone(), value);
            }
        }
    }

    /// Builds the dataset from raw columns, splitting off the id and lineage columns.
    pub fn from_columns(name: String, columns: Vec<LoadedColumn>) -> Self {
        let nrows = columns.first().map(|c| c.values.len()).unwrap_or(0);

        let find = |wanted: &str| columns.iter().find(|c| c.name == wanted);
        let ids: Vec<String> = match find(ID_COLUMN) {
            Some(col) => col
                .values
                .iter()
                .enumerate()
                .map(|(ridx, v)| cell_to_id(v).unwrap_or_else(|| ridx.to_string()))
                .collect(),
            None => (0..nrows).map(|ridx| ridx.to_string()).collect(),
        };
        let parent = PARENT_COLUMNS.iter().find_map(|p| find(*p));
        let added = find(ADDED_COLUMN);
        let source = find(SOURCE_COLUMN);

        let reserved = |n: &str| {
            n == ID_COLUMN || n == ADDED_COLUMN || n == SOURCE_COLUMN || PARENT_COLUMNS.contains(&n)
        };
        let spec: Spec = columns
            .iter()
            .filter(|c| !reserved(&c.name))
            .map(|c| (c.name.clone(), infer_field_spec(c)))
            .collect();

        let mut inputs = Vec::with_capacity(nrows);
        for (ridx, id) in ids.into_iter().enumerate() {
            let mut input = IndexedInput::new(id);
            for column in columns.iter().filter(|c| !reserved(&c.name)) {
                let value = column.values.get(ridx).cloned().unwrap_or(CellValue::Null);
                input.data.insert(column.name.clone(), value);
            }
            input.meta = InputMeta {
                parent_id: parent.and_then(|c| c.values.get(ridx)).and_then(cell_to_id),
                added: added
                    .and_then(|c| c.values.get(ridx))
                    .and_then(CellValue::as_bool)
                    .unwrap_or(false),
                source: source.and_then(|c| c.values.get(ridx)).and_then(cell_to_id),
            };
            inputs.push(input);
        }

        let mut seen = HashSet::new();
        let duplicates = inputs.iter().filter(|i| !seen.insert(i.id.clone())).count();
        if duplicates > 0 {
            warn!("Dataset {name} contains {duplicates} duplicate ids");
        }

        Dataset::new(name, spec, inputs)
    }
}

impl Predictions {
    pub fn from_columns(model: String, columns: Vec<LoadedColumn>) -> Result<Self, TVError> {
        let Some(ids) = columns.iter().find(|c| c.name == ID_COLUMN) else {
            return Err(TVError::LoadingFailed(format!(
                "predictions for {model} have no \"{ID_COLUMN}\" column"
            )));
        };
        let ids: Vec<Option<String>> = ids.values.iter().map(cell_to_id).collect();

        let columns = columns
            .iter()
            .filter(|c| c.name != ID_COLUMN)
            .map(|c| PredictionColumn {
                name: format!("{model}:{}", c.name),
                spec: infer_field_spec(c),
                values: ids
                    .iter()
                    .zip(c.values.iter())
                    .filter_map(|(id, v)| id.clone().map(|id| (id, v.clone())))
                    .collect(),
            })
            .collect();
        Ok(Predictions { model, columns })
    }
}

fn cell_to_id(value: &CellValue) -> Option<String> {
    match value {
        CellValue::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        CellValue::Number(n) if n.fract() == 0.0 => Some(format!("{}", *n as i64)),
        CellValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Derives a field type from the polars dtype and, for strings, the values themselves.
pub fn infer_field_spec(column: &LoadedColumn) -> FieldSpec {
    let dtype = &column.dtype;
    if dtype.is_bool() {
        return FieldSpec::new(FieldType::Boolean);
    }
    if dtype.is_integer() {
        return FieldSpec::new(FieldType::Integer);
    }
    if dtype.is_float() {
        return FieldSpec::new(FieldType::Scalar);
    }
    if let DataType::List(_) = dtype {
        let lists: Vec<usize> = column
            .values
            .iter()
            .filter_map(|v| match v {
                CellValue::List(items) => Some(items.len()),
                _ => None,
            })
            .collect();
        let avg = lists.iter().sum::<usize>() / lists.len().max(1);
        return if avg > MAX_TOKEN_LIST_LEN {
            FieldSpec::new(FieldType::Embeddings)
        } else {
            FieldSpec::new(FieldType::TokenList)
        };
    }

    let texts: Vec<&str> = column.values.iter().filter_map(CellValue::as_str).collect();
    if texts.is_empty() {
        return FieldSpec::new(FieldType::String);
    }
    if texts
        .iter()
        .all(|t| t.starts_with("http://") || t.starts_with("https://"))
    {
        return FieldSpec::new(FieldType::Url);
    }

    let distinct: HashSet<&str> = texts.iter().copied().collect();
    if distinct.len() <= MAX_CATEGORY_VOCAB && distinct.len() < texts.len() {
        let mut vocab: Vec<String> = distinct.into_iter().map(String::from).collect();
        vocab.sort();
        return FieldSpec::new(FieldType::CategoryLabel).with_vocab(vocab);
    }

    let avg_len = texts.iter().map(|t| t.chars().count()).sum::<usize>() / texts.len();
    if avg_len > TEXT_SEGMENT_MIN_LEN {
        FieldSpec::new(FieldType::TextSegment)
    } else {
        FieldSpec::new(FieldType::String)
    }
}

fn detect_file_type(path: &Path) -> Result<FileType, TVError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::CSV),
        Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
        _ => Err(TVError::UnknownFileType),
    }
}

fn get_file_info(path: PathBuf) -> Result<FileInfo, TVError> {
    let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => TVError::FileNotFound,
        ErrorKind::PermissionDenied => TVError::PermissionDenied,
        _ => TVError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(TVError::LoadingFailed("Not a file!".into()));
    }

    let file_size = metadata.len();
    let file_type = detect_file_type(&path)?;

    Ok(FileInfo {
        path,
        file_size,
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

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn text_column(name: &str, values: &[&str]) -> LoadedColumn {
        LoadedColumn {
            name: name.to_string(),
            dtype: DataType::String,
            values: values.iter().map(|v| CellValue::Text(v.to_string())).collect(),
        }
    }

    #[test]
    fn splits_reserved_columns_into_meta() {
        let columns = vec![
            text_column("id", &["r1", "r2", "r3"]),
            text_column("_parent", &["", "r1", ""]),
            LoadedColumn {
                name: "_added".to_string(),
                dtype: DataType::Boolean,
                values: vec![
                    CellValue::Bool(false),
                    CellValue::Bool(true),
                    CellValue::Null,
                ],
            },
            text_column("sentence", &["a", "b", "c"]),
        ];
        let dataset = Dataset::from_columns("toy".to_string(), columns);

        assert_eq!(dataset.spec.names(), vec!["sentence".to_string()]);
        let ids: Vec<&str> = dataset.inputs.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2", "r3"]);
        assert_eq!(dataset.inputs[0].meta.parent_id, None);
        assert_eq!(dataset.inputs[1].meta.parent_id.as_deref(), Some("r1"));
        assert!(dataset.inputs[1].meta.added);
        assert!(!dataset.inputs[2].meta.added);
    }

    #[test]
    fn index_field_is_renamed_away_from_the_row_index() {
        let columns = vec![
            text_column("index", &["user-data", "more"]),
            text_column("index_", &["x", "y"]),
        ];
        let dataset = Dataset::from_columns("pandas".to_string(), columns);

        assert_eq!(
            dataset.spec.names(),
            vec!["index__".to_string(), "index_".to_string()]
        );
        assert_eq!(
            dataset.inputs[0].data.get("index__"),
            Some(&CellValue::Text("user-data".to_string()))
        );
        assert_eq!(dataset.inputs[0].data.get("index"), None);
    }

    #[test]
    fn missing_id_column_falls_back_to_row_numbers() {
        let dataset =
            Dataset::from_columns("toy".to_string(), vec![text_column("x", &["a", "b"])]);
        let ids: Vec<&str> = dataset.inputs.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["0", "1"]);
    }

    #[test]
    fn infers_string_subtypes() {
        let urls = text_column("link", &["https://a.org", "http://b.org"]);
        assert_eq!(infer_field_spec(&urls).field_type, FieldType::Url);

        let labels = text_column("label", &["pos", "neg", "pos", "neg"]);
        let spec = infer_field_spec(&labels);
        assert_eq!(spec.field_type, FieldType::CategoryLabel);
        assert_eq!(spec.vocab, Some(vec!["neg".to_string(), "pos".to_string()]));

        let long = "a fairly long sentence that keeps going well past the text threshold";
        let text = text_column("sentence", &[long, "another one, also rather long for a label"]);
        assert_eq!(infer_field_spec(&text).field_type, FieldType::TextSegment);

        let short = text_column("name", &["ann", "bob"]);
        assert_eq!(infer_field_spec(&short).field_type, FieldType::String);
    }

    #[test]
    fn predictions_need_an_id_column() {
        let result = Predictions::from_columns("m".to_string(), vec![text_column("p", &["x"])]);
        assert!(matches!(result, Err(TVError::LoadingFailed(_))));
    }

    #[test]
    fn predictions_are_prefixed_with_model_name() {
        let predictions = Predictions::from_columns(
            "bert".to_string(),
            vec![
                text_column("id", &["r1", "r2"]),
                LoadedColumn {
                    name: "score".to_string(),
                    dtype: DataType::Float64,
                    values: vec![CellValue::Number(0.25), CellValue::Number(0.75)],
                },
            ],
        )
        .unwrap();
        assert_eq!(predictions.columns.len(), 1);
        let column = &predictions.columns[0];
        assert_eq!(column.name, "bert:score");
        assert_eq!(column.spec.field_type, FieldType::Scalar);
        assert_eq!(column.values.get("r2"), Some(&CellValue::Number(0.75)));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        assert!(matches!(
            detect_file_type(Path::new("data.txt")),
            Err(TVError::UnknownFileType)
        ));
    }

    #[test]
    fn loads_csv_from_disk() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "id,_parent,_added,sentence,score").unwrap();
        writeln!(file, "r1,,false,hello,1").unwrap();
        writeln!(file, "r2,r1,true,hello there,2").unwrap();
        writeln!(file, "r3,,false,bye,3").unwrap();
        file.flush().unwrap();

        let dataset = load_dataset(file.path()).unwrap();
        assert_eq!(dataset.inputs.len(), 3);
        assert_eq!(dataset.inputs[1].meta.parent_id.as_deref(), Some("r1"));
        assert!(dataset.inputs[1].meta.added);
        assert_eq!(
            dataset.spec.get("score").map(|s| s.field_type),
            Some(FieldType::Integer)
        );
        assert_eq!(
            dataset.inputs[2].data.get("score"),
            Some(&CellValue::Number(3.0))
        );
    }
}
