use std::sync::Arc;

use catalog_service::handlers::read_csv_files;
use catalog_service::{CatalogError, CatalogService, CsvHandler, MemoryCatalogStore, ProductFilter};

const HEADER: &str = "product_name,description,price,quantity,categories\n";

fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[tokio::test]
async fn files_on_disk_flow_into_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let paths = vec![
        write(&dir, "tools.csv", &format!("{}Widget,desc,10,5,\"a, b\"\nHammer,steel,25.5,2,tools\n", HEADER)),
        write(&dir, "broken.csv", "name,price\nWidget,1\n"),
        write(&dir, "lamps.csv", &format!("sku,{}\nL-1,Lamp,desk lamp,12,3.0,Lighting\n", HEADER.trim_end())),
    ];

    let files = read_csv_files(&paths).unwrap();
    let report = CsvHandler::new().ingest_files(files);
    assert_eq!(report.accepted, vec!["tools.csv", "lamps.csv"]);
    assert_eq!(report.rejected_names(), vec!["broken.csv"]);

    let service = CatalogService::from_store(Arc::new(MemoryCatalogStore::new()));
    assert_eq!(service.upload(&report).await.unwrap(), 3);

    assert_eq!(service.list_categories().await.unwrap(), vec!["a", "b", "tools", "Lighting"]);

    let lamps = service.products_in_category("Lighting").await.unwrap();
    assert_eq!(lamps.len(), 1);
    assert_eq!(lamps[0].quantity, 3);
    assert_eq!(lamps[0].extra.get_str("sku").unwrap(), "L-1");

    let widget = &service.search_products("WIDGET").await.unwrap()[0];
    assert_eq!(widget.price, 10.0);
    assert_eq!(widget.categories, vec!["a", "b"]);
}

#[tokio::test]
async fn reupload_duplicates_records_but_not_categories() {
    let service = CatalogService::from_store(Arc::new(MemoryCatalogStore::new()));
    let content = format!("{}Widget,desc,10,5,a\n", HEADER);

    for _ in 0..2 {
        let report = CsvHandler::new().ingest_files(vec![catalog_service::CsvFile::new("w.csv", content.as_str())]);
        service.upload(&report).await.unwrap();
    }

    assert_eq!(service.count_products().await.unwrap(), 2);
    assert_eq!(service.list_categories().await.unwrap(), vec!["a"]);
}

#[tokio::test]
async fn one_bad_row_rejects_the_whole_upload() {
    let service = CatalogService::from_store(Arc::new(MemoryCatalogStore::new()));
    let content = format!("{}Widget,desc,10,5,a\nFree,desc,-1,5,a\nLamp,desk,3,1,b\n", HEADER);
    let report = CsvHandler::new().ingest_files(vec![catalog_service::CsvFile::new("mixed.csv", content.as_str())]);

    let err = service.upload(&report).await.unwrap_err();
    assert!(matches!(err, CatalogError::SchemaViolation { index: 1, .. }));
    assert!(service.find_products(&ProductFilter::default()).await.unwrap().is_empty());
    assert_eq!(report.products_ready(), 3);
}
