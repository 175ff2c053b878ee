use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use cart_eng::store::StoreError;
use cart_eng::{Amount, CartAction, CartEngine, Coupon, KeyValueStore, MemoryStore, Product};

/// Store that drops every write, to measure the engine without persistence.
struct NullStore;

impl KeyValueStore for NullStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Ok(())
    }

    fn remove(&self, _key: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

const COLORS: [&str; 3] = ["Red", "Blue", "Green"];

/// Generates a shopping session over a fixed catalog.
///
/// Pattern per step (repeating):
/// 1. Add a product in some color
/// 2. Add the same product again
/// 3. Bump the quantity of an earlier line
/// 4. Recolor an earlier line (merging when the target exists)
pub struct ActionGenerator {
    catalog: Vec<Product>,
    remaining: usize,
    step: usize,
}

impl ActionGenerator {
    pub fn new(products: usize, actions: usize) -> Self {
        let catalog = (0..products)
            .map(|i| {
                Product::new(
                    format!("p{i}"),
                    format!("Product {i}"),
                    Amount::from_rupees(100 + i as i64),
                )
            })
            .collect();
        Self {
            catalog,
            remaining: actions,
            step: 0,
        }
    }
}

impl Iterator for ActionGenerator {
    type Item = CartAction;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let product = &self.catalog[(self.step / 4) % self.catalog.len()];
        let color = COLORS[self.step % COLORS.len()];
        let action = match self.step % 4 {
            0 | 1 => CartAction::Add {
                product: product.clone(),
                color: Some(color.to_string()),
            },
            2 => CartAction::SetQuantity {
                product_id: product.id.clone(),
                color: Some(color.to_string()),
                quantity: 3,
            },
            _ => CartAction::Recolor {
                product_id: product.id.clone(),
                from: Some(color.to_string()),
                to: Some(COLORS[(self.step + 1) % COLORS.len()].to_string()),
            },
        };
        self.step += 1;
        Some(action)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for ActionGenerator {}

fn bench_engine_only(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_only");

    for products in [10usize, 100, 1_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(products),
            &products,
            |b, &products| {
                b.iter(|| {
                    let mut engine = CartEngine::open(NullStore);
                    engine.apply_coupon(Coupon::percentage(
                        "TEN",
                        Amount::from_rupees(10),
                        Amount::from_rupees(500),
                    ));
                    for action in ActionGenerator::new(products, products * 4) {
                        black_box(engine.apply(action));
                    }
                    engine
                });
            },
        );
    }

    group.finish();
}

fn bench_with_persistence(c: &mut Criterion) {
    let mut group = c.benchmark_group("with_persistence");

    // every mutation re-encodes the whole cart
    for products in [10usize, 100] {
        group.bench_with_input(
            BenchmarkId::from_parameter(products),
            &products,
            |b, &products| {
                b.iter(|| {
                    let mut engine = CartEngine::open(MemoryStore::new());
                    for action in ActionGenerator::new(products, products * 4) {
                        black_box(engine.apply(action));
                    }
                    engine
                });
            },
        );
    }

    group.finish();
}

fn bench_restore(c: &mut Criterion) {
    let mut group = c.benchmark_group("restore");

    for products in [10usize, 100, 1_000] {
        let store = MemoryStore::new();
        {
            let mut engine = CartEngine::open(&store);
            for action in ActionGenerator::new(products, products * 4) {
                engine.apply(action);
            }
        }
        group.bench_with_input(BenchmarkId::from_parameter(products), &store, |b, store| {
            b.iter(|| black_box(CartEngine::open(store)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_engine_only,
    bench_with_persistence,
    bench_restore
);
criterion_main!(benches);
