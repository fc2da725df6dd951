//! Example demonstrating the #[derive(Component)] macro
//!
//! Run with:
//!   cargo run --example derive --features derive

use component_dispatcher::param;
use component_dispatcher::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TICKET: AtomicU64 = AtomicU64::new(1);

#[derive(Component)]
struct Database {
    // Non-dependency fields start from Default
    queries: AtomicU64,
}

impl Database {
    fn query(&self, sql: &str) -> String {
        let n = self.queries.fetch_add(1, Ordering::SeqCst) + 1;
        format!("[query #{}] {}", n, sql)
    }
}

#[derive(Default)]
struct Ticket(u64);

#[derive(Component)]
#[component(scope = "prototype")]
struct TicketIssuer {
    ticket: Ticket,
}

impl TicketIssuer {
    fn number(&self) -> u64 {
        if self.ticket.0 == 0 {
            NEXT_TICKET.fetch_add(1, Ordering::SeqCst)
        } else {
            self.ticket.0
        }
    }
}

#[derive(Component)]
struct AuditLog;

#[derive(Component)]
struct UserController {
    #[dep]
    db: Arc<Database>,
    #[dep]
    issuer: Arc<TicketIssuer>,
    #[inject]
    audit: Inject<AuditLog>,
}

impl Controller for UserController {
    fn routes(table: &mut RouteTable<Self>) {
        table.route(
            "/users/{id}",
            "show",
            vec![param::path("id").typed::<i64>()],
            |c, mut args| {
                let _audit: &AuditLog = &c.audit;
                Ok(format!(
                    "{} (ticket {})",
                    c.db.query(&format!("SELECT * FROM users WHERE id = {}", args.long(0)?)),
                    c.issuer.number()
                ))
            },
        );
    }
}

fn main() {
    println!("=== Component Derive Macro Demo ===\n");

    let dispatcher = Scanner::new()
        .component::<Database>()
        .component::<TicketIssuer>()
        .component::<AuditLog>()
        .controller::<UserController>()
        .scan()
        .expect("scan failed");

    let container = dispatcher.container();
    for type_id in container.registered_types() {
        if let Some(descriptor) = container.descriptor(type_id) {
            println!("  registered: {} ({:?})", descriptor.type_name(), descriptor.scope());
        }
    }
    println!();

    // TicketIssuer is a prototype, so the controller is rebuilt per request
    for id in [1, 2, 3] {
        let path = format!("/users/{}", id);
        let result = dispatcher.dispatch(&mut RequestContext::new(path.as_str()));
        println!("GET {} -> {}", path, result.body.as_text().unwrap_or(""));
    }

    println!("\n=== Demo Complete ===");
    println!("\nThe #[derive(Component)] macro generated a Component impl that:");
    println!("  - Takes #[dep] fields as constructor dependencies");
    println!("  - Fills #[inject] fields after construction");
    println!("  - Reads the lifecycle from #[component(scope = \"...\")]");
    println!("  - Uses Default::default() for all other fields");
}
