//! In-process repository.
//!
//! Mirrors the `PostgreSQL` schema closely enough for the service and HTTP
//! test suites: the same unique keys, the same cascades on delete and the
//! same per-customer checkout serialization.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use marketplace_core::{
    BasketLineId, CustomerId, Email, OrderId, OrderItemId, OrderNumber, OrderStatus,
    ProductCategoryId, ProductId, StockNumber, StoreCategoryId, StoreId,
};

use super::{
    BasketRepository, CheckoutTransaction, CustomerRepository, OrderRepository, ProductRepository,
    Repository, RepositoryError, SessionRepository, StoreRepository,
};
use crate::models::{
    BasketLine, Customer, CustomerUpdate, NewCustomer, NewOrder, NewOrderItem, NewStore, Order,
    OrderItem, Product, ProductCategory, ProductUpsert, SessionRecord, Store, StoreCategory,
    StoreUpdate,
};

#[derive(Debug, Clone)]
struct BasketRow {
    id: BasketLineId,
    customer_id: CustomerId,
    product_id: ProductId,
    store_id: StoreId,
    quantity: i32,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i32,
    customers: BTreeMap<CustomerId, Customer>,
    sessions: BTreeMap<CustomerId, SessionRecord>,
    stores: BTreeMap<StoreId, Store>,
    store_categories: BTreeMap<StoreCategoryId, StoreCategory>,
    members: BTreeSet<(StoreId, StoreCategoryId)>,
    product_categories: BTreeMap<ProductCategoryId, ProductCategory>,
    products: BTreeMap<ProductId, Product>,
    basket: BTreeMap<BasketLineId, BasketRow>,
    orders: BTreeMap<OrderId, Order>,
    items: BTreeMap<OrderItemId, OrderItem>,
}

impl MemoryState {
    fn allocate(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn joined_line(&self, row: &BasketRow) -> Result<BasketLine, RepositoryError> {
        let product = self.products.get(&row.product_id).ok_or_else(|| {
            RepositoryError::DataCorruption(format!("basket line {} has no product", row.id))
        })?;
        let store = self.stores.get(&row.store_id).ok_or_else(|| {
            RepositoryError::DataCorruption(format!("basket line {} has no store", row.id))
        })?;

        Ok(BasketLine {
            id: row.id,
            customer_id: row.customer_id,
            product_id: row.product_id,
            store_id: row.store_id,
            quantity: row.quantity,
            stock_number: product.stock_number,
            product_name: product.name.clone(),
            unit_price: product.price,
            weight_class: product.weight_class,
            store_name: store.name.clone(),
            nominal_delivery_price: store.nominal_delivery_price,
        })
    }

    fn lines_of(&self, customer: CustomerId) -> Result<Vec<BasketLine>, RepositoryError> {
        self.basket
            .values()
            .filter(|row| row.customer_id == customer)
            .map(|row| self.joined_line(row))
            .collect()
    }

    fn remove_store(&mut self, id: StoreId) -> bool {
        if self.stores.remove(&id).is_none() {
            return false;
        }
        self.products.retain(|_, p| p.store_id != id);
        let products = &self.products;
        self.basket
            .retain(|_, row| row.store_id != id && products.contains_key(&row.product_id));
        self.members.retain(|(store, _)| *store != id);
        true
    }

    fn remove_order(&mut self, id: OrderId) {
        self.orders.remove(&id);
        self.items.retain(|_, item| item.order_id != id);
    }
}

/// Repository holding all rows in memory.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    state: Arc<Mutex<MemoryState>>,
    customer_locks: Arc<Mutex<HashMap<CustomerId, Arc<Mutex<()>>>>>,
}

impl MemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn customer_lock(&self, customer: CustomerId) -> Arc<Mutex<()>> {
        let mut locks = self.customer_locks.lock().await;
        Arc::clone(locks.entry(customer).or_default())
    }
}

#[async_trait]
impl CustomerRepository for MemoryRepository {
    async fn create_customer(&self, new: &NewCustomer) -> Result<Customer, RepositoryError> {
        let mut state = self.state.lock().await;

        if state.customers.values().any(|c| c.email == new.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        if new.seller_vendor_id.is_some()
            && state
                .customers
                .values()
                .any(|c| c.seller_vendor_id == new.seller_vendor_id)
        {
            return Err(RepositoryError::Conflict("vendor id already taken".to_owned()));
        }

        let now = Utc::now();
        let customer = Customer {
            id: CustomerId::new(state.allocate()),
            email: new.email.clone(),
            password_hash: new.password_hash.clone(),
            email_verified: false,
            is_active: true,
            user_name: new.user_name.clone(),
            first_name: new.first_name.clone(),
            last_name: new.last_name.clone(),
            phone_number: new.phone_number.clone(),
            organization: new.organization.clone(),
            address: new.address.clone(),
            area_code: new.area_code,
            is_vendor: new.is_vendor,
            seller_vendor_id: new.seller_vendor_id,
            created_at: now,
            updated_at: now,
        };
        state.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn customer_by_id(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        Ok(self.state.lock().await.customers.get(&id).cloned())
    }

    async fn customer_by_email(&self, email: &Email) -> Result<Option<Customer>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.customers.values().find(|c| c.email == *email).cloned())
    }

    async fn update_customer(
        &self,
        id: CustomerId,
        update: &CustomerUpdate,
    ) -> Result<Customer, RepositoryError> {
        let mut state = self.state.lock().await;
        let customer = state
            .customers
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;

        if let Some(hash) = &update.password_hash {
            customer.password_hash.clone_from(hash);
        }
        if let Some(user_name) = &update.user_name {
            customer.user_name.clone_from(user_name);
        }
        if let Some(first_name) = &update.first_name {
            customer.first_name.clone_from(first_name);
        }
        if let Some(last_name) = &update.last_name {
            customer.last_name.clone_from(last_name);
        }
        if let Some(phone_number) = &update.phone_number {
            customer.phone_number.clone_from(phone_number);
        }
        if update.organization.is_some() {
            customer.organization.clone_from(&update.organization);
        }
        if update.address.is_some() {
            customer.address.clone_from(&update.address);
        }
        if let Some(area_code) = update.area_code {
            customer.area_code = area_code;
        }
        if let Some(is_active) = update.is_active {
            customer.is_active = is_active;
        }
        customer.updated_at = Utc::now();

        Ok(customer.clone())
    }

    async fn mark_email_verified(&self, id: CustomerId) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        Ok(state.customers.get_mut(&id).is_some_and(|c| {
            c.email_verified = true;
            c.updated_at = Utc::now();
            true
        }))
    }

    async fn delete_customer(&self, id: CustomerId) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.customers.remove(&id).is_none() {
            return Ok(false);
        }

        state.sessions.remove(&id);
        state.basket.retain(|_, row| row.customer_id != id);
        let orders: Vec<OrderId> = state
            .orders
            .values()
            .filter(|o| o.customer_id == id)
            .map(|o| o.id)
            .collect();
        for order in orders {
            state.remove_order(order);
        }
        let stores: Vec<StoreId> = state
            .stores
            .values()
            .filter(|s| s.owner_id == id)
            .map(|s| s.id)
            .collect();
        for store in stores {
            state.remove_store(store);
        }
        for category in state.store_categories.values_mut() {
            if category.created_by == Some(id) {
                category.created_by = None;
            }
        }

        Ok(true)
    }
}

#[async_trait]
impl SessionRepository for MemoryRepository {
    async fn replace_session(
        &self,
        customer: CustomerId,
        token_digest: &str,
        created_at: DateTime<Utc>,
    ) -> Result<SessionRecord, RepositoryError> {
        let mut state = self.state.lock().await;
        if !state.customers.contains_key(&customer) {
            return Err(RepositoryError::Conflict(format!(
                "customer {customer} does not exist"
            )));
        }

        let record = SessionRecord {
            customer_id: customer,
            token_digest: token_digest.to_owned(),
            created_at,
        };
        state.sessions.insert(customer, record.clone());
        Ok(record)
    }

    async fn session_for(
        &self,
        customer: CustomerId,
    ) -> Result<Option<SessionRecord>, RepositoryError> {
        Ok(self.state.lock().await.sessions.get(&customer).cloned())
    }

    async fn delete_session(&self, customer: CustomerId) -> Result<bool, RepositoryError> {
        Ok(self.state.lock().await.sessions.remove(&customer).is_some())
    }
}

#[async_trait]
impl StoreRepository for MemoryRepository {
    async fn create_store(
        &self,
        new: &NewStore,
        category: StoreCategoryId,
    ) -> Result<Store, RepositoryError> {
        let mut state = self.state.lock().await;

        if state.stores.values().any(|s| s.owner_id == new.owner_id) {
            return Err(RepositoryError::Conflict(
                "customer already owns a store".to_owned(),
            ));
        }
        if !state.store_categories.contains_key(&category) {
            return Err(RepositoryError::NotFound);
        }

        let store = Store {
            id: StoreId::new(state.allocate()),
            owner_id: new.owner_id,
            name: new.name.clone(),
            address: new.address.clone(),
            url: new.url.clone(),
            nominal_delivery_price: new.nominal_delivery_price,
            status: new.status,
        };
        state.stores.insert(store.id, store.clone());
        state.members.insert((store.id, category));
        Ok(store)
    }

    async fn store_by_id(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        Ok(self.state.lock().await.stores.get(&id).cloned())
    }

    async fn store_by_owner(&self, owner: CustomerId) -> Result<Option<Store>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.stores.values().find(|s| s.owner_id == owner).cloned())
    }

    async fn update_store(
        &self,
        id: StoreId,
        update: &StoreUpdate,
        category: Option<StoreCategoryId>,
    ) -> Result<Store, RepositoryError> {
        let mut state = self.state.lock().await;
        if let Some(category) = category
            && !state.store_categories.contains_key(&category)
        {
            return Err(RepositoryError::NotFound);
        }

        let store = state.stores.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if let Some(name) = &update.name {
            store.name.clone_from(name);
        }
        if let Some(address) = &update.address {
            store.address.clone_from(address);
        }
        if update.url.is_some() {
            store.url.clone_from(&update.url);
        }
        if let Some(price) = update.nominal_delivery_price {
            store.nominal_delivery_price = price;
        }
        if let Some(status) = update.status {
            store.status = status;
        }
        let store = store.clone();

        if let Some(category) = category {
            state.members.insert((id, category));
        }
        Ok(store)
    }

    async fn delete_store(&self, id: StoreId) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.products.values().any(|p| p.store_id == id) {
            return Err(RepositoryError::Conflict(format!(
                "store {id} still lists products"
            )));
        }
        Ok(state.remove_store(id))
    }

    async fn categories_of_store(
        &self,
        id: StoreId,
    ) -> Result<Vec<StoreCategory>, RepositoryError> {
        let state = self.state.lock().await;
        let mut categories: Vec<StoreCategory> = state
            .members
            .iter()
            .filter(|(store, _)| *store == id)
            .filter_map(|(_, category)| state.store_categories.get(category).cloned())
            .collect();
        categories.sort_by_key(|c| c.store_cat_id);
        Ok(categories)
    }

    async fn upsert_store_category(
        &self,
        store_cat_id: i64,
        name: &str,
        created_by: CustomerId,
    ) -> Result<StoreCategory, RepositoryError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state
            .store_categories
            .values_mut()
            .find(|c| c.store_cat_id == store_cat_id)
        {
            existing.name = name.to_owned();
            return Ok(existing.clone());
        }

        let category = StoreCategory {
            id: StoreCategoryId::new(state.allocate()),
            store_cat_id,
            name: name.to_owned(),
            created_by: Some(created_by),
        };
        state.store_categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn store_category(
        &self,
        store_cat_id: i64,
    ) -> Result<Option<StoreCategory>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .store_categories
            .values()
            .find(|c| c.store_cat_id == store_cat_id)
            .cloned())
    }

    async fn stores_in_category(
        &self,
        id: StoreCategoryId,
    ) -> Result<Vec<Store>, RepositoryError> {
        let state = self.state.lock().await;
        let mut stores: Vec<Store> = state
            .members
            .iter()
            .filter(|(_, category)| *category == id)
            .filter_map(|(store, _)| state.stores.get(store).cloned())
            .collect();
        stores.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(stores)
    }

    async fn delete_store_category(&self, id: StoreCategoryId) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.members.iter().any(|(_, category)| *category == id) {
            return Err(RepositoryError::Conflict(
                "Store category not empty".to_owned(),
            ));
        }
        Ok(state.store_categories.remove(&id).is_some())
    }
}

#[async_trait]
impl ProductRepository for MemoryRepository {
    async fn upsert_product_category(
        &self,
        prod_cat_id: i64,
        name: &str,
    ) -> Result<ProductCategory, RepositoryError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state
            .product_categories
            .values_mut()
            .find(|c| c.prod_cat_id == prod_cat_id)
        {
            existing.name = name.to_owned();
            return Ok(existing.clone());
        }

        let category = ProductCategory {
            id: ProductCategoryId::new(state.allocate()),
            prod_cat_id,
            name: name.to_owned(),
        };
        state.product_categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn product_category(
        &self,
        prod_cat_id: i64,
    ) -> Result<Option<ProductCategory>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .product_categories
            .values()
            .find(|c| c.prod_cat_id == prod_cat_id)
            .cloned())
    }

    async fn products_in_category(
        &self,
        id: ProductCategoryId,
    ) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| p.category_id == Some(id))
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn delete_product_category(
        &self,
        id: ProductCategoryId,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.products.values().any(|p| p.category_id == Some(id)) {
            return Err(RepositoryError::Conflict(
                "Product category not empty".to_owned(),
            ));
        }
        Ok(state.product_categories.remove(&id).is_some())
    }

    async fn product_by_stock_number(
        &self,
        stock_number: StockNumber,
    ) -> Result<Option<Product>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .products
            .values()
            .find(|p| p.stock_number == stock_number)
            .cloned())
    }

    async fn search_products(&self, query: Option<&str>) -> Result<Vec<Product>, RepositoryError> {
        let needle = query.map(str::to_lowercase);
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| {
                needle.as_deref().is_none_or(|needle| {
                    p.name.to_lowercase().contains(needle)
                        || p.model
                            .as_deref()
                            .is_some_and(|m| m.to_lowercase().contains(needle))
                })
            })
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn products_by_store(&self, store: StoreId) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| p.store_id == store)
            .cloned()
            .collect();
        products.sort_by_key(|p| p.stock_number);
        Ok(products)
    }

    async fn upsert_product(&self, product: &ProductUpsert) -> Result<Product, RepositoryError> {
        let mut state = self.state.lock().await;
        if !state.stores.contains_key(&product.store_id) {
            return Err(RepositoryError::Conflict(format!(
                "store {} does not exist",
                product.store_id
            )));
        }
        let prod_cat_id = match product.category_id {
            Some(id) => Some(
                state
                    .product_categories
                    .get(&id)
                    .map(|c| c.prod_cat_id)
                    .ok_or_else(|| {
                        RepositoryError::Conflict(format!("product category {id} does not exist"))
                    })?,
            ),
            None => None,
        };

        let existing = state
            .products
            .values()
            .find(|p| p.stock_number == product.stock_number)
            .map(|p| (p.id, p.store_id));
        let id = match existing {
            Some((_, store)) if store != product.store_id => {
                return Err(RepositoryError::Conflict(format!(
                    "stock number {} belongs to another store",
                    product.stock_number
                )));
            }
            Some((id, _)) => id,
            None => ProductId::new(state.allocate()),
        };

        let row = Product {
            id,
            stock_number: product.stock_number,
            slug: product.stock_number.slug(),
            name: product.name.clone(),
            model: product.model.clone(),
            store_id: product.store_id,
            category_id: product.category_id,
            prod_cat_id,
            price: product.price,
            recommended_price: product.recommended_price,
            weight_class: product.weight_class,
            amount: product.amount,
            description: product.description.clone(),
        };
        state.products.insert(id, row.clone());
        Ok(row)
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.products.remove(&id).is_none() {
            return Ok(false);
        }
        state.basket.retain(|_, row| row.product_id != id);
        Ok(true)
    }
}

#[async_trait]
impl BasketRepository for MemoryRepository {
    async fn upsert_basket_line(
        &self,
        customer: CustomerId,
        product: ProductId,
        store: StoreId,
        quantity: i32,
    ) -> Result<BasketLine, RepositoryError> {
        let lock = self.customer_lock(customer).await;
        let _checkout = lock.lock().await;
        let mut state = self.state.lock().await;
        if !state.customers.contains_key(&customer)
            || !state.products.contains_key(&product)
            || !state.stores.contains_key(&store)
        {
            return Err(RepositoryError::Conflict(
                "basket line references a missing row".to_owned(),
            ));
        }

        let existing = state
            .basket
            .values()
            .find(|row| {
                row.customer_id == customer && row.product_id == product && row.store_id == store
            })
            .map(|row| row.id);
        let id = match existing {
            Some(id) => id,
            None => BasketLineId::new(state.allocate()),
        };
        let row = BasketRow {
            id,
            customer_id: customer,
            product_id: product,
            store_id: store,
            quantity,
        };
        let line = state.joined_line(&row)?;
        state.basket.insert(id, row);
        Ok(line)
    }

    async fn basket_lines(&self, customer: CustomerId) -> Result<Vec<BasketLine>, RepositoryError> {
        self.state.lock().await.lines_of(customer)
    }

    async fn remove_basket_product(
        &self,
        customer: CustomerId,
        product: ProductId,
    ) -> Result<u64, RepositoryError> {
        let lock = self.customer_lock(customer).await;
        let _checkout = lock.lock().await;
        let mut state = self.state.lock().await;
        let before = state.basket.len();
        state
            .basket
            .retain(|_, row| !(row.customer_id == customer && row.product_id == product));
        Ok((before - state.basket.len()) as u64)
    }
}

/// Checkout staged in memory and applied on commit.
///
/// Holds the customer's checkout lock for its whole lifetime.
struct MemoryCheckout {
    state: Arc<Mutex<MemoryState>>,
    _guard: OwnedMutexGuard<()>,
    customer: Customer,
    order: Option<Order>,
    items: Vec<OrderItem>,
    drained: Vec<(BasketLineId, i32)>,
}

#[async_trait]
impl CheckoutTransaction for MemoryCheckout {
    fn customer(&self) -> &Customer {
        &self.customer
    }

    async fn basket_lines(&mut self) -> Result<Vec<BasketLine>, RepositoryError> {
        self.state.lock().await.lines_of(self.customer.id)
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<Option<Order>, RepositoryError> {
        let mut state = self.state.lock().await;
        if state
            .orders
            .values()
            .any(|o| o.order_number == order.order_number)
        {
            return Ok(None);
        }

        let inserted = Order {
            id: OrderId::new(state.allocate()),
            order_number: order.order_number,
            customer_id: order.customer_id,
            area_code: order.area_code,
            total_price: order.total_price,
            final_delivery_price: order.final_delivery_price,
            express_delivery: order.express_delivery,
            status: OrderStatus::New,
            created_at: Utc::now(),
        };
        self.order = Some(inserted.clone());
        Ok(Some(inserted))
    }

    async fn insert_item(
        &mut self,
        order: OrderId,
        item: &NewOrderItem,
    ) -> Result<OrderItem, RepositoryError> {
        if self.order.as_ref().is_none_or(|o| o.id != order) {
            return Err(RepositoryError::NotFound);
        }

        let inserted = OrderItem {
            id: OrderItemId::new(self.state.lock().await.allocate()),
            order_id: order,
            product_id: item.product_id,
            store_id: item.store_id,
            stock_number: item.stock_number,
            unit_price: item.unit_price,
            quantity: item.quantity,
        };
        self.items.push(inserted.clone());
        Ok(inserted)
    }

    async fn drain_basket(&mut self) -> Result<Vec<(BasketLineId, i32)>, RepositoryError> {
        let state = self.state.lock().await;
        self.drained = state
            .basket
            .values()
            .filter(|row| row.customer_id == self.customer.id)
            .map(|row| (row.id, row.quantity))
            .collect();
        Ok(self.drained.clone())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let Self {
            state: shared,
            order,
            items,
            drained,
            ..
        } = *self;
        let mut state = shared.lock().await;

        if let Some(order) = &order
            && state
                .orders
                .values()
                .any(|o| o.order_number == order.order_number)
        {
            return Err(RepositoryError::Conflict(format!(
                "order number {} already exists",
                order.order_number
            )));
        }

        for (id, _) in &drained {
            state.basket.remove(id);
        }
        if let Some(order) = order {
            state.orders.insert(order.id, order);
        }
        for item in items {
            state.items.insert(item.id, item);
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for MemoryRepository {
    async fn begin_checkout(
        &self,
        customer: CustomerId,
    ) -> Result<Box<dyn CheckoutTransaction>, RepositoryError> {
        let guard = self.customer_lock(customer).await.lock_owned().await;
        let customer = self
            .state
            .lock()
            .await
            .customers
            .get(&customer)
            .cloned()
            .ok_or(RepositoryError::NotFound)?;

        Ok(Box::new(MemoryCheckout {
            state: Arc::clone(&self.state),
            _guard: guard,
            customer,
            order: None,
            items: Vec::new(),
            drained: Vec::new(),
        }))
    }

    async fn orders_for(&self, customer: CustomerId) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.customer_id == customer)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn order_for(
        &self,
        customer: CustomerId,
        number: OrderNumber,
    ) -> Result<Option<Order>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .find(|o| o.customer_id == customer && o.order_number == number)
            .cloned())
    }

    async fn order_by_number(&self, number: OrderNumber) -> Result<Option<Order>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .find(|o| o.order_number == number)
            .cloned())
    }

    async fn order_items(&self, order: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .items
            .values()
            .filter(|item| item.order_id == order)
            .cloned()
            .collect())
    }

    async fn delete_order(
        &self,
        order: OrderId,
        expected: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.orders.get(&order).is_none_or(|o| o.status != expected) {
            return Ok(false);
        }
        state.remove_order(order);
        Ok(true)
    }

    async fn update_order_status(
        &self,
        order: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        match state.orders.get_mut(&order) {
            Some(o) if o.status == from => {
                o.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use marketplace_core::Money;

    use super::*;

    fn new_customer(email: &str, vendor_id: Option<i64>) -> NewCustomer {
        NewCustomer {
            email: Email::parse(email).unwrap(),
            password_hash: "hash".to_owned(),
            user_name: email.to_owned(),
            first_name: "Test".to_owned(),
            last_name: "User".to_owned(),
            phone_number: "+100000000".to_owned(),
            organization: None,
            address: Some("1 Main St".to_owned()),
            area_code: 1,
            is_vendor: vendor_id.is_some(),
            seller_vendor_id: vendor_id,
        }
    }

    async fn vendor_with_product(repo: &MemoryRepository) -> (Customer, Store, Product) {
        let vendor = repo
            .create_customer(&new_customer("vendor@example.com", Some(4242)))
            .await
            .unwrap();
        let category = repo
            .upsert_store_category(10, "Tools", vendor.id)
            .await
            .unwrap();
        let store = repo
            .create_store(
                &NewStore {
                    owner_id: vendor.id,
                    name: "Hammers".to_owned(),
                    address: "2 Side St".to_owned(),
                    url: None,
                    nominal_delivery_price: Money::from_units(50),
                    status: true,
                },
                category.id,
            )
            .await
            .unwrap();
        let product = repo
            .upsert_product(&ProductUpsert {
                stock_number: StockNumber::new(15).unwrap(),
                name: "Claw hammer".to_owned(),
                model: Some("CH-1".to_owned()),
                store_id: store.id,
                category_id: None,
                price: Money::from_units(100),
                recommended_price: Money::from_units(120),
                weight_class: 1,
                amount: 5,
                description: None,
            })
            .await
            .unwrap();
        (vendor, store, product)
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let repo = MemoryRepository::new();
        repo.create_customer(&new_customer("a@example.com", None))
            .await
            .unwrap();
        let err = repo
            .create_customer(&new_customer("a@example.com", None))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(msg) if msg == "email already exists"));
    }

    #[tokio::test]
    async fn store_with_products_cannot_be_deleted() {
        let repo = MemoryRepository::new();
        let (_, store, product) = vendor_with_product(&repo).await;
        let buyer = repo
            .create_customer(&new_customer("buyer@example.com", None))
            .await
            .unwrap();
        repo.upsert_basket_line(buyer.id, product.id, store.id, 2)
            .await
            .unwrap();

        let err = repo.delete_store(store.id).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert!(repo.store_by_id(store.id).await.unwrap().is_some());
        assert_eq!(repo.basket_lines(buyer.id).await.unwrap().len(), 1);
        assert!(
            repo.product_by_stock_number(product.stock_number)
                .await
                .unwrap()
                .is_some()
        );

        repo.delete_product(product.id).await.unwrap();
        assert!(repo.delete_store(store.id).await.unwrap());
        assert!(repo.basket_lines(buyer.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_a_vendor_removes_their_store_and_products() {
        let repo = MemoryRepository::new();
        let (vendor, store, product) = vendor_with_product(&repo).await;

        assert!(repo.delete_customer(vendor.id).await.unwrap());
        assert!(repo.store_by_id(store.id).await.unwrap().is_none());
        assert!(
            repo.product_by_stock_number(product.stock_number)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn upsert_product_rejects_foreign_stock_number() {
        let repo = MemoryRepository::new();
        let (_, _, product) = vendor_with_product(&repo).await;
        let other = repo
            .create_customer(&new_customer("other@example.com", Some(77)))
            .await
            .unwrap();
        let category = repo.store_category(10).await.unwrap().unwrap();
        let other_store = repo
            .create_store(
                &NewStore {
                    owner_id: other.id,
                    name: "Other".to_owned(),
                    address: "3 Far St".to_owned(),
                    url: None,
                    nominal_delivery_price: Money::from_units(10),
                    status: true,
                },
                category.id,
            )
            .await
            .unwrap();

        let err = repo
            .upsert_product(&ProductUpsert {
                stock_number: product.stock_number,
                name: "Stolen".to_owned(),
                model: None,
                store_id: other_store.id,
                category_id: None,
                price: Money::from_units(1),
                recommended_price: Money::from_units(1),
                weight_class: 1,
                amount: 1,
                description: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn dropped_checkout_leaves_no_trace() {
        let repo = MemoryRepository::new();
        let (_, store, product) = vendor_with_product(&repo).await;
        let buyer = repo
            .create_customer(&new_customer("buyer@example.com", None))
            .await
            .unwrap();
        repo.upsert_basket_line(buyer.id, product.id, store.id, 1)
            .await
            .unwrap();

        {
            let mut tx = repo.begin_checkout(buyer.id).await.unwrap();
            tx.insert_order(&NewOrder {
                order_number: OrderNumber::new(5000).unwrap(),
                customer_id: buyer.id,
                area_code: 1,
                total_price: Money::from_units(100),
                final_delivery_price: Money::from_units(50),
                express_delivery: false,
            })
            .await
            .unwrap()
            .unwrap();
            tx.drain_basket().await.unwrap();
        }

        assert!(repo.orders_for(buyer.id).await.unwrap().is_empty());
        assert_eq!(repo.basket_lines(buyer.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn basket_update_waits_for_open_checkout() {
        let repo = MemoryRepository::new();
        let (_, store, product) = vendor_with_product(&repo).await;
        let buyer = repo
            .create_customer(&new_customer("buyer@example.com", None))
            .await
            .unwrap();
        repo.upsert_basket_line(buyer.id, product.id, store.id, 1)
            .await
            .unwrap();

        let mut tx = repo.begin_checkout(buyer.id).await.unwrap();
        let lines = tx.basket_lines().await.unwrap();
        assert_eq!(lines[0].quantity, 1);

        let racer = repo.clone();
        let (customer, product, store) = (buyer.id, product.id, store.id);
        let mut update = tokio::spawn(async move {
            racer
                .upsert_basket_line(customer, product, store, 5)
                .await
        });
        let pending = tokio::time::timeout(Duration::from_millis(50), &mut update).await;
        assert!(pending.is_err(), "basket update finished during checkout");

        let drained = tx.drain_basket().await.unwrap();
        assert_eq!(drained, vec![(lines[0].id, 1)]);
        tx.commit().await.unwrap();

        let updated = update.await.unwrap().unwrap();
        assert_eq!(updated.quantity, 5);
        let basket = repo.basket_lines(buyer.id).await.unwrap();
        assert_eq!(basket.len(), 1);
        assert_eq!(basket[0].quantity, 5);
    }

    #[tokio::test]
    async fn status_update_is_compare_and_set() {
        let repo = MemoryRepository::new();
        let buyer = repo
            .create_customer(&new_customer("buyer@example.com", None))
            .await
            .unwrap();
        let mut tx = repo.begin_checkout(buyer.id).await.unwrap();
        let order = tx
            .insert_order(&NewOrder {
                order_number: OrderNumber::new(7000).unwrap(),
                customer_id: buyer.id,
                area_code: 1,
                total_price: Money::ZERO,
                final_delivery_price: Money::ZERO,
                express_delivery: false,
            })
            .await
            .unwrap()
            .unwrap();
        tx.commit().await.unwrap();

        assert!(
            repo.update_order_status(order.id, OrderStatus::New, OrderStatus::Confirmed)
                .await
                .unwrap()
        );
        assert!(
            !repo
                .update_order_status(order.id, OrderStatus::New, OrderStatus::Canceled)
                .await
                .unwrap()
        );
    }
}
