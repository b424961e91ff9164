//! Save granule search results to a parquet file.

use std::{fs::File, path::Path, sync::Arc};

use anyhow::Result;
use arrow::{
    array::{ArrayRef, Float64Array, ListBuilder, StringArray, StringBuilder, TimestampMillisecondArray},
    datatypes::{DataType, Field, Schema, TimeUnit},
    record_batch::RecordBatch,
};
use geo::{BoundingRect, MultiPolygon};
use parquet::{arrow::ArrowWriter, file::properties::WriterProperties};

use crate::cmr::{Access, Granule};

pub fn save_granules(granules: &[Granule], file_path: &Path) -> Result<()> {
    let file = File::create(file_path)?;

    let schema = Arc::new(Schema::new(vec![
        Field::new("concept_id", DataType::Utf8, false),
        Field::new("granule_ur", DataType::Utf8, false),
        Field::new("short_name", DataType::Utf8, true),
        Field::new("version", DataType::Utf8, true),
        Field::new("begin", DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into())), true),
        Field::new("end", DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into())), true),
        Field::new("cloud_cover", DataType::Float64, true),
        Field::new("size_mb", DataType::Float64, true),
        Field::new("west", DataType::Float64, true),
        Field::new("south", DataType::Float64, true),
        Field::new("east", DataType::Float64, true),
        Field::new("north", DataType::Float64, true),
        Field::new(
            "data_links",
            DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))),
            false,
        ),
    ]));

    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::ZSTD(parquet::basic::ZstdLevel::default()))
        .set_dictionary_enabled(true)
        .build();

    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

    let num_rows = granules.len();

    let mut concept_ids = Vec::with_capacity(num_rows);
    let mut granule_urs = Vec::with_capacity(num_rows);
    let mut short_names = Vec::with_capacity(num_rows);
    let mut versions = Vec::with_capacity(num_rows);
    let mut begins = Vec::with_capacity(num_rows);
    let mut ends = Vec::with_capacity(num_rows);
    let mut cloud_covers = Vec::with_capacity(num_rows);
    let mut sizes = Vec::with_capacity(num_rows);
    let mut wests = Vec::with_capacity(num_rows);
    let mut souths = Vec::with_capacity(num_rows);
    let mut easts = Vec::with_capacity(num_rows);
    let mut norths = Vec::with_capacity(num_rows);
    let mut links = ListBuilder::new(StringBuilder::new());

    for g in granules {
        concept_ids.push(g.concept_id.clone());
        granule_urs.push(g.granule_ur.clone());
        short_names.push(g.short_name.clone());
        versions.push(g.version.clone());
        begins.push(g.begin.map(|t| t.timestamp_millis()));
        ends.push(g.end.map(|t| t.timestamp_millis()));
        cloud_covers.push(g.cloud_cover);
        sizes.push(g.size_mb());

        let bbox = MultiPolygon::new(g.footprint.clone()).bounding_rect();
        wests.push(bbox.map(|r| r.min().x));
        souths.push(bbox.map(|r| r.min().y));
        easts.push(bbox.map(|r| r.max().x));
        norths.push(bbox.map(|r| r.max().y));

        for link in g.data_links(Access::External) {
            links.values().append_value(link);
        }
        links.append(true);
    }

    let timestamps = |values: Vec<Option<i64>>| TimestampMillisecondArray::from(values).with_timezone("UTC");

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(concept_ids)),
        Arc::new(StringArray::from(granule_urs)),
        Arc::new(StringArray::from(short_names)),
        Arc::new(StringArray::from(versions)),
        Arc::new(timestamps(begins)),
        Arc::new(timestamps(ends)),
        Arc::new(Float64Array::from(cloud_covers)),
        Arc::new(Float64Array::from(sizes)),
        Arc::new(Float64Array::from(wests)),
        Arc::new(Float64Array::from(souths)),
        Arc::new(Float64Array::from(easts)),
        Arc::new(Float64Array::from(norths)),
        Arc::new(links.finish()),
    ];

    let batch = RecordBatch::try_new(schema, columns)?;

    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use std::fs;

    use arrow::array::{Array, ListArray};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::NamedTempFile;

    use crate::cmr::umm::test::granule_fixture;

    use super::*;

    #[test]
    fn should_write_one_row_per_granule() {
        let granules = granule_fixture();
        let temp_file = NamedTempFile::new().unwrap();

        save_granules(&granules, temp_file.path()).unwrap();

        let file = fs::File::open(temp_file.path()).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();

        let mut total_rows = 0;
        for batch_result in reader {
            let batch = batch_result.unwrap();
            total_rows += batch.num_rows();

            let schema = batch.schema();
            assert_eq!(schema.fields().len(), 13);
            assert_eq!(schema.field(0).name(), "concept_id");
            assert_eq!(schema.field(12).name(), "data_links");

            let ids = batch.column(0).as_any().downcast_ref::<StringArray>().unwrap();
            assert_eq!(ids.value(0), "G2506194368-LPCLOUD");

            let links = batch.column(12).as_any().downcast_ref::<ListArray>().unwrap();
            assert_eq!(links.value(0).len(), 3);
            assert_eq!(links.value(1).len(), 0);

            let wests = batch.column(8).as_any().downcast_ref::<Float64Array>().unwrap();
            assert_eq!(wests.value(0), -62.73);
            assert!(wests.is_null(1));
        }

        assert_eq!(total_rows, 2);
    }

    #[test]
    fn should_write_empty_results() {
        let temp_file = NamedTempFile::new().unwrap();
        save_granules(&[], temp_file.path()).unwrap();

        assert!(fs::metadata(temp_file.path()).unwrap().len() > 0);
    }
}
