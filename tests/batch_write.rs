/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 *
 * Licensed under the Apache License, Version 2.0 (the "License").
 * You may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

mod util;

use dynamap::batch::BatchWriteOperation;
use dynamap::transport::WriteRequest;
use std::collections::HashMap;
use std::sync::Arc;
use util::{item, key, pk_of, MockTransport};

async fn drain(
    mut operation: BatchWriteOperation<MockTransport>,
) -> Vec<(String, dynamap::Item)> {
    let mut yielded = vec![];
    while let Some(result) = operation.next().await {
        yielded.push(result.expect("no failures expected"));
    }
    yielded
}

#[tokio::test]
async fn batch_write_partitions_across_tables() {
    let transport = Arc::new(MockTransport::new());
    let tables = ["snap", "crackle", "pop"];
    let elements: Vec<(String, WriteRequest)> = (0..80)
        .map(|i| {
            (
                tables[i % 3].to_string(),
                WriteRequest::put(item(&i.to_string())),
            )
        })
        .collect();

    let yielded = drain(BatchWriteOperation::from_iter(
        Arc::clone(&transport),
        elements,
    ))
    .await;
    // puts are all acknowledged and yielded
    assert_eq!(yielded.len(), 80);

    let calls = transport.batch_write_calls.lock().unwrap();
    let sizes: Vec<usize> = calls
        .iter()
        .map(|input| {
            input
                .request_items
                .values()
                .map(|requests| requests.len())
                .sum::<usize>()
        })
        .collect();
    assert_eq!(sizes, vec![25, 25, 25, 5]);
}

#[tokio::test]
async fn deletes_succeed_silently() {
    let transport = Arc::new(MockTransport::new());
    let mut elements: Vec<(String, WriteRequest)> = (0..10)
        .map(|i| {
            (
                String::from("tbl"),
                WriteRequest::put(item(&format!("put-{}", i))),
            )
        })
        .collect();
    elements.extend((0..5).map(|i| {
        (
            String::from("tbl"),
            WriteRequest::delete(key(&format!("del-{}", i))),
        )
    }));

    let yielded = drain(BatchWriteOperation::from_iter(
        Arc::clone(&transport),
        elements,
    ))
    .await;
    // ten puts yielded; the five deletes completed without a yield
    assert_eq!(yielded.len(), 10);
    assert!(yielded
        .iter()
        .all(|(_, item)| pk_of(item).starts_with("put-")));

    // all fifteen requests still went on the wire in one batch
    let calls = transport.batch_write_calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].request_items["tbl"].len(), 15);
}

#[tokio::test]
async fn unprocessed_writes_are_retried_not_acknowledged() {
    let transport = Arc::new(MockTransport::new());
    transport.bounce_once(&["7"]);
    let elements: Vec<(String, WriteRequest)> = (0..30)
        .map(|i| {
            (
                String::from("tbl"),
                WriteRequest::put(item(&i.to_string())),
            )
        })
        .collect();

    let yielded = drain(BatchWriteOperation::from_iter(
        Arc::clone(&transport),
        elements,
    ))
    .await;

    // every put acknowledged exactly once, including the bounced one
    assert_eq!(yielded.len(), 30);
    let mut seen: HashMap<String, usize> = HashMap::new();
    for (_, item) in &yielded {
        *seen.entry(pk_of(item).to_string()).or_default() += 1;
    }
    assert_eq!(seen.len(), 30);
    assert!(seen.values().all(|count| *count == 1));

    // request 7 was sent twice in total
    let calls = transport.batch_write_calls.lock().unwrap();
    let mut appearances: HashMap<String, usize> = HashMap::new();
    for input in calls.iter() {
        for requests in input.request_items.values() {
            for request in requests {
                let pk = match request {
                    WriteRequest::Put { item } => pk_of(item),
                    WriteRequest::Delete { key } => pk_of(key),
                };
                *appearances.entry(pk.to_string()).or_default() += 1;
            }
        }
    }
    assert_eq!(appearances["7"], 2);
    assert_eq!(appearances.values().sum::<usize>(), 31);
}

#[tokio::test]
async fn bounced_deletes_are_retried_and_stay_silent() {
    let transport = Arc::new(MockTransport::new());
    transport.bounce_once(&["victim"]);
    let elements = vec![
        (String::from("tbl"), WriteRequest::delete(key("victim"))),
        (String::from("tbl"), WriteRequest::put(item("other"))),
    ];

    let yielded = drain(BatchWriteOperation::from_iter(
        Arc::clone(&transport),
        elements,
    ))
    .await;
    // only the put is yielded; the delete retried silently
    assert_eq!(yielded.len(), 1);
    assert_eq!(pk_of(&yielded[0].1), "other");

    let calls = transport.batch_write_calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    // the retry batch carries the delete again
    let retried = &calls[1].request_items["tbl"];
    assert_eq!(retried.len(), 1);
    assert!(matches!(retried[0], WriteRequest::Delete { .. }));
}

#[tokio::test]
async fn duplicate_writes_are_sent_in_request_order() {
    let transport = Arc::new(MockTransport::new());
    let elements = vec![
        (String::from("tbl"), WriteRequest::put(item("dup"))),
        (String::from("tbl"), WriteRequest::put(item("dup"))),
    ];
    let yielded = drain(BatchWriteOperation::from_iter(
        Arc::clone(&transport),
        elements,
    ))
    .await;
    assert_eq!(yielded.len(), 2);

    let calls = transport.batch_write_calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].request_items["tbl"].len(), 2);
}
