use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

use crate::error::ExperimentResult;
use crate::metrics::SimulationResult;

type FloatColumn = (&'static str, fn(&SimulationResult) -> f64);

const FLOAT_COLUMNS: [FloatColumn; 9] = [
    ("mean_final_soc", |r| r.mean_final_soc),
    ("requests_served_percent", |r| r.requests_served_percent),
    ("total_vkt", |r| r.total_vkt),
    ("servicing_vkt", |r| r.servicing_vkt),
    ("deadhead_vkt", |r| r.deadhead_vkt),
    ("charging_time_percent", |r| r.charging_time_percent),
    ("idle_time_percent", |r| r.idle_time_percent),
    ("station_revenue", |r| r.station_revenue),
    ("fleet_revenue", |r| r.fleet_revenue),
];

type CountColumn = (&'static str, fn(&SimulationResult) -> u64);

const COUNT_COLUMNS: [CountColumn; 6] = [
    ("run_id", |r| r.run_id as u64),
    ("seed", |r| r.seed),
    ("num_vehicles", |r| r.num_vehicles as u64),
    ("num_requests", |r| r.num_requests as u64),
    ("num_stations", |r| r.num_stations as u64),
    ("final_vehicle_count", |r| r.final_vehicle_count as u64),
];

pub(crate) fn export_to_parquet_impl(
    results: &[SimulationResult],
    health_scores: &[f64],
    file: std::fs::File,
) -> ExperimentResult<()> {
    let batch = build_record_batch(results, health_scores)?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn build_record_batch(
    results: &[SimulationResult],
    health_scores: &[f64],
) -> Result<RecordBatch, arrow::error::ArrowError> {
    let mut fields = vec![
        Field::new("experiment_id", DataType::Utf8, false),
        Field::new("charging_search_type", DataType::Utf8, false),
    ];
    let mut arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(results.iter().map(|r| r.experiment_id.as_str()))),
        Arc::new(StringArray::from_iter_values(
            results.iter().map(|r| r.charging_search_type.as_str()),
        )),
    ];

    for (name, value) in COUNT_COLUMNS {
        fields.push(Field::new(name, DataType::UInt64, false));
        arrays.push(Arc::new(UInt64Array::from_iter_values(results.iter().map(value))));
    }
    for (name, value) in FLOAT_COLUMNS {
        fields.push(Field::new(name, DataType::Float64, false));
        arrays.push(Arc::new(Float64Array::from_iter_values(results.iter().map(value))));
    }
    fields.push(Field::new("health_score", DataType::Float64, true));
    arrays.push(Arc::new(Float64Array::from(
        (0..results.len()).map(|i| health_scores.get(i).copied()).collect::<Vec<_>>(),
    )));

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
}
