use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::{criterion_group, criterion_main};

use alifeconv::alife::{AlifeRecord, AlifeTable};
use alifeconv::forest::{BuildOptions, ExportOptions, Forest};
use alifeconv::tree::Tree;

// Caterpillar phylogeny: every internal node has a tip and the next internal node as children
fn caterpillar(n_leaves: u64) -> AlifeTable {
    let mut table = AlifeTable::from_records(vec![AlifeRecord::new(0, "[None]").with_origin_time(0.0)]);
    let mut parent = 0;
    for i in 1..n_leaves {
        let tip = 2 * i - 1;
        let internal = 2 * i;
        table.push(
            AlifeRecord::new(tip, &format!("[{parent}]"))
                .with_origin_time(i as f64 + 0.5)
                .with_taxon_label(&format!("Tip_{i}")),
        );
        table.push(AlifeRecord::new(internal, &format!("[{parent}]")).with_origin_time(i as f64));
        parent = internal;
    }
    table
}

fn build(table: &AlifeTable) {
    let options = BuildOptions::default().setup_edge_lengths(true);
    let _trees = Tree::forest_from_alife(table, &options).unwrap();
}

fn flatten(trees: &[Tree]) {
    let _table = Forest::from_traversal(trees)
        .unwrap()
        .to_table(&ExportOptions::default())
        .unwrap();
}

fn from_elem(c: &mut Criterion) {
    let table = caterpillar(500);
    let options = BuildOptions::default().setup_edge_lengths(true);
    let trees = Tree::forest_from_alife(&table, &options).unwrap();

    c.bench_with_input(BenchmarkId::new("build_trees", table.len()), &table, |b, s| {
        b.iter(|| build(s));
    });

    c.bench_with_input(
        BenchmarkId::new("flatten_trees", table.len()),
        &trees,
        |b, s| {
            b.iter(|| flatten(s));
        },
    );
}

criterion_group!(benches, from_elem);
criterion_main!(benches);
