//! Client-side cart of books waiting to be checked out.

use booky_core::{Book, BookId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub book_id: BookId,
    pub title: String,
    pub cover_url: Option<String>,
    pub qty: u32,
}

impl CartItem {
    pub fn from_book(book: &Book, qty: u32) -> Self {
        Self {
            book_id: book.id,
            title: book.title.clone(),
            cover_url: book.cover_url.clone(),
            qty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("Book {0} is not in the cart")]
    NotInCart(BookId),
    #[error("Cart is empty")]
    Empty,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item; a book already in the cart has its quantity increased.
    pub fn add(&mut self, item: CartItem) -> Result<(), CartError> {
        if item.qty == 0 {
            return Err(CartError::InvalidQuantity);
        }
        match self.items.iter_mut().find(|i| i.book_id == item.book_id) {
            Some(found) => found.qty = found.qty.saturating_add(item.qty),
            None => self.items.push(item),
        }
        Ok(())
    }

    pub fn remove(&mut self, book_id: BookId) -> Result<CartItem, CartError> {
        let index = self
            .items
            .iter()
            .position(|i| i.book_id == book_id)
            .ok_or(CartError::NotInCart(book_id))?;
        Ok(self.items.remove(index))
    }

    /// Remove every item whose book is in `ids`, returning them in cart order.
    pub fn take(&mut self, ids: &[BookId]) -> Vec<CartItem> {
        let (taken, kept) = std::mem::take(&mut self.items)
            .into_iter()
            .partition(|i| ids.contains(&i.book_id));
        self.items = kept;
        taken
    }

    /// Put items back after a failed checkout.
    pub fn restore(&mut self, items: Vec<CartItem>) {
        for item in items {
            // Quantities are already positive.
            let _ = self.add(item);
        }
    }

    pub fn clear(&mut self) -> usize {
        let count = self.items.len();
        self.items.clear();
        count
    }

    /// Items chosen for checkout; every item when `ids` is `None`.
    pub fn selected(&self, ids: Option<&[BookId]>) -> Vec<CartItem> {
        match ids {
            None => self.items.clone(),
            Some(ids) => self
                .items
                .iter()
                .filter(|i| ids.contains(&i.book_id))
                .cloned()
                .collect(),
        }
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn contains(&self, book_id: BookId) -> bool {
        self.items.iter().any(|i| i.book_id == book_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|i| i.qty).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use booky_core::EntityIdType;

    fn item(id: i64, qty: u32) -> CartItem {
        CartItem {
            book_id: BookId::new(id),
            title: format!("Book {}", id),
            cover_url: None,
            qty,
        }
    }

    #[test]
    fn test_add_merges_quantity() {
        let mut cart = Cart::new();
        cart.add(item(1, 1)).unwrap();
        cart.add(item(2, 1)).unwrap();
        cart.add(item(1, 2)).unwrap();

        assert_eq!(cart.len(), 2);
        assert_eq!(cart.items()[0].qty, 3);
        assert_eq!(cart.total_quantity(), 4);
        assert_eq!(cart.add(item(3, 0)), Err(CartError::InvalidQuantity));
    }

    #[test]
    fn test_remove_missing_book() {
        let mut cart = Cart::new();
        cart.add(item(1, 1)).unwrap();
        assert_eq!(cart.remove(BookId::new(1)).unwrap().qty, 1);
        assert_eq!(
            cart.remove(BookId::new(1)),
            Err(CartError::NotInCart(BookId::new(1)))
        );
    }

    #[test]
    fn test_selected_defaults_to_everything() {
        let mut cart = Cart::new();
        cart.add(item(1, 1)).unwrap();
        cart.add(item(2, 1)).unwrap();

        assert_eq!(cart.selected(None).len(), 2);
        let picked = cart.selected(Some(&[BookId::new(2), BookId::new(9)]));
        assert_eq!(picked, vec![item(2, 1)]);
    }

    #[test]
    fn test_take_and_restore() {
        let mut cart = Cart::new();
        for id in 1..=3 {
            cart.add(item(id, 1)).unwrap();
        }
        let taken = cart.take(&[BookId::new(1), BookId::new(3)]);
        assert_eq!(taken.len(), 2);
        assert_eq!(cart.items(), &[item(2, 1)]);

        cart.restore(taken);
        assert_eq!(cart.len(), 3);
        assert!(cart.contains(BookId::new(3)));
        assert_eq!(cart.clear(), 3);
        assert!(cart.is_empty());
    }
}
