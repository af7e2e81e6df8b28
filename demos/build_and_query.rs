use lodtree::prelude::*;
use std::sync::Arc;

fn payload_for(p: Point) -> Vec<u8> {
    let mut out = Vec::with_capacity(24);
    out.extend_from_slice(&p.x.to_le_bytes());
    out.extend_from_slice(&p.y.to_le_bytes());
    out.extend_from_slice(&p.z.to_le_bytes());
    out
}

#[tokio::main(flavor = "current_thread")]
pub async fn main() {
    tracing_subscriber::fmt::init();

    let bounds = Bbox::new(Point::new(0.0, 0.0, 0.0), Point::new(100.0, 100.0, 100.0));
    let structure = Structure::new(3, 64, 3, 6).expect("valid structure");
    let client = Arc::new(MemoryClient::new());

    let mut writer = TreeWriter::new(
        Endpoint::new("", client.clone()),
        Schema::xyz(),
        structure,
        bounds.clone(),
    )
    .expect("unable to create writer");

    tracing::info!("Indexing a synthetic point cloud");
    for i in 0..50_000u32 {
        // a cheap space-filling scatter
        let p = Point::new(
            (i as f64 * 7.31) % 100.0,
            (i as f64 * 13.57) % 100.0,
            (i as f64 * 3.17) % 100.0,
        );
        writer.insert(p, &payload_for(p)).expect("insert failed");
    }
    tracing::info!("Indexed {} points", writer.inserted());

    writer.save().await.expect("unable to save tree");
    tracing::info!("Saved {} blobs", client.len());

    let reader = TreeReader::open(Endpoint::new("", client))
        .await
        .expect("unable to open tree");

    let region = Bbox::new(Point::new(25.0, 25.0, 0.0), Point::new(50.0, 50.0, 100.0));
    for depth_end in [4, 6, 8] {
        let records = reader
            .query(&region, 0, depth_end)
            .await
            .expect("query failed");
        tracing::info!(
            "Query to depth {} streamed {} points",
            depth_end,
            records.len()
        );
    }
}
