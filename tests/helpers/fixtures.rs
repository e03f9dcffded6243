//! Fixtures shared by the integration tests.

use serde_json::{json, Value};
use xrefs::types::Range;

pub const APP: &str = "github.com/acme/app";
pub const LIB: &str = "github.com/acme/lib";
pub const FORK: &str = "github.com/acme/lib-fork";
pub const SVC_A: &str = "github.com/acme/svc-a";
pub const SVC_B: &str = "github.com/acme/svc-b";
pub const SVC_C: &str = "github.com/acme/svc-c";

pub fn range(start_line: u32, start_character: u32, end_line: u32, end_character: u32) -> Value {
    serde_json::to_value(Range::new(start_line, start_character, end_line, end_character)).unwrap()
}

fn export(identifier: &str) -> Value {
    json!({ "kind": "export", "scheme": "gomod", "identifier": identifier })
}

fn edge(path: &str, range: Value) -> Value {
    json!({ "path": path, "range": range })
}

fn moniker_row(upload_id: i64, table: &str, identifier: &str, path: &str, range: Value) -> Value {
    json!({
        "upload_id": upload_id,
        "table": table,
        "scheme": "gomod",
        "identifier": identifier,
        "path": path,
        "range": range,
    })
}

/// One upload of `APP` built at `c1` and still used at `c2`. Between the two
/// commits a header line of `main.go` was replaced and a line was inserted,
/// so lines after the header shift down by one.
pub fn shifted_app() -> Value {
    json!({
        "uploads": [
            { "id": 1, "repository": APP, "commit": "c1", "indexer": "scip-go", "visible_at": ["c2"] }
        ],
        "symbols": [
            {
                "upload_id": 1,
                "path": "main.go",
                "range": range(9, 5, 9, 12),
                "monikers": [export("app.Handler")],
                "references": [
                    edge("main.go", range(9, 5, 9, 12)),
                    edge("main.go", range(20, 1, 20, 8)),
                    edge("util.go", range(3, 2, 3, 9)),
                    edge("main.go", range(1, 0, 1, 7))
                ]
            }
        ],
        "diffs": [
            {
                "repository": APP,
                "from_commit": "c1",
                "to_commit": "c2",
                "path": "main.go",
                "diff": "--- a/main.go\n+++ b/main.go\n@@ -1,3 +1,4 @@\n package main\n-// old header\n+// new header\n+// generated\n import \"fmt\"\n"
            }
        ]
    })
}

/// Two uploads covering `APP/main.go` at `c1`: upload 1 knows three
/// references to the symbol at 4:6 and upload 2 knows two.
pub fn two_uploads() -> Value {
    json!({
        "uploads": [
            { "id": 1, "repository": APP, "commit": "c1", "indexer": "scip-go" },
            { "id": 2, "repository": APP, "commit": "c1", "indexer": "lsif-go" }
        ],
        "symbols": [
            {
                "upload_id": 1,
                "path": "main.go",
                "range": range(4, 5, 4, 9),
                "monikers": [export("app.Run")],
                "references": [
                    edge("main.go", range(4, 5, 4, 9)),
                    edge("main.go", range(11, 2, 11, 6)),
                    edge("cmd.go", range(7, 0, 7, 4))
                ]
            },
            {
                "upload_id": 2,
                "path": "main.go",
                "range": range(4, 5, 4, 9),
                "monikers": [export("app.Run")],
                "references": [
                    edge("server.go", range(30, 8, 30, 12)),
                    edge("server.go", range(41, 8, 41, 12))
                ]
            }
        ]
    })
}

/// `LIB` exports `lib.Foo` from `foo.go` at `l1`. A fork redefines it and
/// three services depend on it, one of them only on an unrelated symbol.
pub fn library_with_dependents() -> Value {
    json!({
        "uploads": [
            { "id": 10, "repository": LIB, "commit": "l1", "indexer": "scip-go" },
            { "id": 11, "repository": FORK, "commit": "f1", "indexer": "scip-go" },
            { "id": 20, "repository": SVC_A, "commit": "a1", "indexer": "scip-go" },
            { "id": 21, "repository": SVC_B, "commit": "b1", "indexer": "scip-go" },
            { "id": 22, "repository": SVC_C, "commit": "s1", "indexer": "scip-go" }
        ],
        "symbols": [
            {
                "upload_id": 10,
                "path": "foo.go",
                "range": range(4, 5, 4, 8),
                "monikers": [export("lib.Foo")],
                "references": [
                    edge("foo.go", range(4, 5, 4, 8)),
                    edge("foo.go", range(12, 2, 12, 5))
                ],
                "implementations": [
                    edge("foo_impl.go", range(40, 0, 40, 3))
                ]
            }
        ],
        "moniker_locations": [
            moniker_row(11, "definitions", "lib.Foo", "foo.go", range(4, 5, 4, 8)),
            moniker_row(11, "references", "lib.Foo", "foo.go", range(30, 0, 30, 3)),
            moniker_row(20, "references", "lib.Foo", "main.go", range(3, 1, 3, 4)),
            moniker_row(20, "references", "lib.Foo", "main.go", range(7, 1, 7, 4)),
            moniker_row(21, "references", "lib.Foo", "handler.go", range(15, 8, 15, 11)),
            moniker_row(21, "implementations", "lib.Foo", "impl.go", range(2, 5, 2, 8)),
            moniker_row(22, "references", "other.Bar", "bar.go", range(1, 0, 1, 3))
        ]
    })
}
