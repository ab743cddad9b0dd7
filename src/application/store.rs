use tokio::sync::watch;

#[derive(Debug)]
pub struct Store<T> {
    sender: watch::Sender<T>,
}

impl<T: Clone> Store<T> {
    pub fn new(initial: T) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    pub fn snapshot(&self) -> T {
        self.sender.borrow().clone()
    }

    pub fn read<R>(&self, project: impl FnOnce(&T) -> R) -> R {
        project(&self.sender.borrow())
    }

    pub fn update(&self, transition: impl FnOnce(&mut T)) {
        self.sender.send_modify(transition);
    }

    pub fn update_if(&self, transition: impl FnOnce(&mut T) -> bool) -> bool {
        self.sender.send_if_modified(transition)
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.sender.subscribe()
    }
}

impl<T: Clone + Default> Default for Store<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
