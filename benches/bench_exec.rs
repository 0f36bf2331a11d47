use std::{io, ops::ControlFlow, path::Path, time::Duration};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use flashsql::{
    Database, MountConfig, PartitionTable, Row, RowVisitor, SqliteEngine, execute, sql,
};

const SAMPLE_SIZE: usize = 20;
const WARM_UP: Duration = Duration::from_millis(300);
const MEASURE: Duration = Duration::from_millis(500);
const ROW_COUNTS: &[usize] = &[1, 100, 1_000];

struct CountingVisitor(usize);

impl RowVisitor for CountingVisitor {
    fn visit(&mut self, _label: &str, row: Row<'_>) -> ControlFlow<()> {
        self.0 += row.len();
        ControlFlow::Continue(())
    }
}

fn bench_select(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("tempdir");
    let table = PartitionTable::new(dir.path());
    table.create_partition("storage").expect("partition");
    let partition = table
        .mount(&MountConfig {
            base_path: "/bench".into(),
            ..MountConfig::default()
        })
        .expect("mount");
    let engine = SqliteEngine::new();

    let mut group = c.benchmark_group("select_all");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);
    for &rows in ROW_COUNTS {
        let path = format!("/bench/select_{rows}.db");
        partition.remove_file(&path).expect("cleanup");
        let mut db = Database::open(&engine, &partition, Path::new(&path), &mut io::sink())
            .expect("open");
        let mut setup = sql::create_table("t");
        for id in 0..rows as i64 {
            setup.push_str(&sql::insert_row("t", id, "payload"));
        }
        execute(&mut db, &setup, "setup", &mut io::sink(), &mut CountingVisitor(0))
            .expect("setup");
        group.bench_function(BenchmarkId::from_parameter(rows), |b| {
            b.iter(|| {
                let mut visitor = CountingVisitor(0);
                execute(&mut db, &sql::select_all("t"), "row", &mut io::sink(), &mut visitor)
                    .expect("select");
                visitor.0
            });
        });
        db.close().expect("close");
    }
    group.finish();
}

criterion_group!(
    name = exec_benches;
    config = Criterion::default();
    targets = bench_select
);
criterion_main!(exec_benches);
