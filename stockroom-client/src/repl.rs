//! REPL command handling for the client CLI.

use crate::api::{StockClient, StoreError};

/// Line-oriented command interpreter over a [`StockClient`].
pub struct Repl {
    client: StockClient,
}

impl Repl {
    #[must_use]
    pub fn new(client: StockClient) -> Self {
        Self { client }
    }

    /// Execute one REPL line.
    ///
    /// # Errors
    /// Returns an error string for usage mistakes and failed
    /// operations, and the sentinel `"exit"` when the user quits.
    pub async fn execute(&mut self, line: &str) -> Result<String, String> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            return Ok(String::new());
        }

        match parts[0] {
            "help" | "?" => Ok(Self::help()),
            "exit" | "quit" => Err("exit".to_owned()),
            "create" => {
                let item = Self::item_arg(&parts, "create <item>")?;
                self.client
                    .create_item(item)
                    .await
                    .map(|()| "ok".to_owned())
                    .map_err(render)
            }
            "delete" => {
                let item = Self::item_arg(&parts, "delete <item>")?;
                self.client
                    .delete_item(item)
                    .await
                    .map(|()| "ok".to_owned())
                    .map_err(render)
            }
            "add" => {
                let (item, qty) = Self::qty_args(&parts, "add <item> <qty>")?;
                self.client
                    .add_stock(item, qty)
                    .await
                    .map(|level| format!("{item}: {level}"))
                    .map_err(render)
            }
            "remove" => {
                let (item, qty) = Self::qty_args(&parts, "remove <item> <qty>")?;
                self.client
                    .remove_stock(item, qty)
                    .await
                    .map(|level| format!("{item}: {level}"))
                    .map_err(render)
            }
            "query" => {
                let item = Self::item_arg(&parts, "query <item>")?;
                self.client
                    .query_stock(item)
                    .await
                    .map(|level| format!("{item}: {level}"))
                    .map_err(render)
            }
            "leader" => match self.client.leader().await {
                Some(leader) => Ok(leader.to_string()),
                None => Ok("no leader".to_owned()),
            },
            other => Err(format!("unknown command {other:?} (try help)")),
        }
    }

    fn item_arg<'a>(parts: &[&'a str], usage: &str) -> Result<&'a str, String> {
        match parts {
            &[_, item] if !item.is_empty() => Ok(item),
            _ => Err(format!("usage: {usage}")),
        }
    }

    fn qty_args<'a>(parts: &[&'a str], usage: &str) -> Result<(&'a str, u64), String> {
        let &[_, item, qty] = parts else {
            return Err(format!("usage: {usage}"));
        };
        let qty: u64 = qty.parse().map_err(|_| format!("usage: {usage}"))?;
        if qty == 0 {
            return Err("quantity must be at least 1".to_owned());
        }
        Ok((item, qty))
    }

    fn help() -> String {
        [
            "create <item>        create an item with zero stock",
            "delete <item>        delete an item",
            "add <item> <qty>     add stock",
            "remove <item> <qty>  remove stock",
            "query <item>         read the stock level",
            "leader               show the currently trusted replica",
            "exit                 quit",
        ]
        .join("\n")
    }
}

fn render(error: StoreError) -> String {
    error.to_string()
}
