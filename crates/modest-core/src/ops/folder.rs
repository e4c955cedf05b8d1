//! Folder create, remove, rename and transfer

use super::store_for;
use crate::rules::{validate_folder_name, FolderCapabilities};
use crate::{AppContext, CoreError, CoreResult, MailOperation};
use futures::executor::block_on;
use modest_store::{FolderId, FolderInfo, FolderType, ParentRef, Store};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Receives the resulting folder, `None` on failure
pub type FolderCallback = Box<dyn FnOnce(&MailOperation, Option<&FolderInfo>) + Send>;

fn parent_capabilities(
    ctx: &AppContext,
    store: &dyn Store,
    parent: &ParentRef,
) -> CoreResult<FolderCapabilities> {
    match parent {
        ParentRef::Account(name) => Ok(FolderCapabilities::of_root(
            store,
            ctx.accounts().is_local_folders(name),
        )),
        ParentRef::Folder(id) => Ok(FolderCapabilities::of_folder(&block_on(store.folder(id))?)),
    }
}

/// Fail if `parent` already has a child called `name` (other than `except`)
fn check_name_free(
    store: &dyn Store,
    parent: &ParentRef,
    name: &str,
    except: Option<&FolderId>,
) -> CoreResult<()> {
    let taken = block_on(store.children(parent))?
        .iter()
        .any(|f| f.name == name && Some(&f.id) != except);
    if taken {
        return Err(CoreError::FolderExists(parent.child_id(name).to_string()));
    }
    Ok(())
}

enum RemovePlan {
    Delete(Arc<dyn Store>),
    ToTrash {
        store: Arc<dyn Store>,
        info: FolderInfo,
        trash: FolderId,
    },
}

impl MailOperation {
    /// Create `name` under `parent`
    pub fn create_folder(&self, parent: ParentRef, name: &str, callback: Option<FolderCallback>) {
        self.start();
        let store = match self.prepare_create(&parent, name) {
            Ok(store) => store,
            Err(e) => return self.end_folder_op(Err(e), callback),
        };
        let name = name.to_string();
        self.spawn(move |op| {
            let result = block_on(store.create_folder(&parent, &name)).map_err(CoreError::from);
            if let Ok(ref info) = result {
                info!("Created folder {}", info.id);
            }
            op.end_folder_op(result, callback);
        });
    }

    fn prepare_create(&self, parent: &ParentRef, name: &str) -> CoreResult<Arc<dyn Store>> {
        let store = store_for(self.context(), parent.account())?;
        self.set_account(parent.account(), Some(store.clone()));
        let parent_caps = parent_capabilities(self.context(), store.as_ref(), parent)?;
        if !parent_caps.can_write() {
            return Err(CoreError::FolderRules(format!("{} does not accept new folders", parent)));
        }
        validate_folder_name(name)?;
        check_name_free(store.as_ref(), parent, name, None)?;
        if parent_caps.is_reserved_name(name) {
            return Err(CoreError::FolderRules(format!("{:?} is a reserved name", name)));
        }
        Ok(store)
    }

    /// Remove a folder, either into the account's trash or for good
    pub fn remove_folder(&self, folder: FolderId, move_to_trash: bool) {
        self.start();
        match self.prepare_remove(&folder, move_to_trash) {
            Err(e) => self.fail_now(e),
            Ok(RemovePlan::Delete(store)) => self.spawn(move |op| {
                let result = block_on(store.remove_folder(&folder)).map_err(CoreError::from);
                if result.is_ok() {
                    info!("Removed folder {}", folder);
                }
                op.finish(result);
                op.notify_end();
            }),
            Ok(RemovePlan::ToTrash { store, info, trash }) => {
                let parent = ParentRef::Folder(trash);
                match self.prepare_transfer(&info, &parent, &info.name, true) {
                    Ok(dest) => {
                        let name = info.name.clone();
                        self.spawn_copy(store, dest, info, parent, name, true, None)
                    }
                    Err(e) => self.fail_now(e),
                }
            }
        }
    }

    fn prepare_remove(&self, folder: &FolderId, move_to_trash: bool) -> CoreResult<RemovePlan> {
        let store = store_for(self.context(), &folder.account)?;
        self.set_account(&folder.account, Some(store.clone()));
        let info = block_on(store.folder(folder))?;
        if !FolderCapabilities::of_folder(&info).can_delete() {
            return Err(CoreError::FolderRules(format!("{} cannot be deleted", folder)));
        }
        if !move_to_trash {
            return Ok(RemovePlan::Delete(store));
        }
        let trash = block_on(store.special_folder(FolderType::Trash))?
            .ok_or_else(|| CoreError::ItemNotFound(format!("trash folder of {}", folder.account)))?;
        if folder.is_within(&trash.id) {
            debug!("{} is already in the trash, deleting it", folder);
            return Ok(RemovePlan::Delete(store));
        }
        Ok(RemovePlan::ToTrash {
            store,
            info,
            trash: trash.id,
        })
    }

    /// Rename a folder in place
    pub fn rename_folder(&self, folder: FolderId, new_name: &str, callback: Option<FolderCallback>) {
        self.start();
        let (store, info) = match self.prepare_rename(&folder, new_name) {
            Ok(prepared) => prepared,
            Err(e) => return self.end_folder_op(Err(e), callback),
        };
        if info.name == new_name {
            return self.end_folder_op(Ok(info), callback);
        }
        let parent = info.parent_ref();
        let new_name = new_name.to_string();
        self.spawn_copy(store.clone(), store, info, parent, new_name, true, callback);
    }

    fn prepare_rename(&self, folder: &FolderId, new_name: &str) -> CoreResult<(Arc<dyn Store>, FolderInfo)> {
        let store = store_for(self.context(), &folder.account)?;
        self.set_account(&folder.account, Some(store.clone()));
        let info = block_on(store.folder(folder))?;
        if !FolderCapabilities::of_folder(&info).can_rename() {
            return Err(CoreError::FolderRules(format!("{} cannot be renamed", folder)));
        }
        validate_folder_name(new_name)?;
        let parent = info.parent_ref();
        let parent_caps = parent_capabilities(self.context(), store.as_ref(), &parent)?;
        if !parent_caps.can_write() {
            return Err(CoreError::FolderRules(format!("parent of {} is read-only", folder)));
        }
        if parent_caps.is_reserved_name(new_name) {
            return Err(CoreError::FolderRules(format!("{:?} is a reserved name", new_name)));
        }
        check_name_free(store.as_ref(), &parent, new_name, Some(&info.id))?;
        Ok((store, info))
    }

    /// Copy a folder tree under `parent`, moving it with `delete_original`.
    /// The destination may belong to another account.
    pub fn xfer_folder(
        &self,
        folder: FolderId,
        parent: ParentRef,
        delete_original: bool,
        callback: Option<FolderCallback>,
    ) {
        self.start();
        let prepared = store_for(self.context(), &folder.account).and_then(|store| {
            self.set_account(&folder.account, Some(store.clone()));
            let info = block_on(store.folder(&folder))?;
            let dest = self.prepare_transfer(&info, &parent, &info.name, delete_original)?;
            Ok((store, dest, info))
        });
        match prepared {
            Ok((store, dest, info)) => {
                let name = info.name.clone();
                self.spawn_copy(store, dest, info, parent, name, delete_original, callback)
            }
            Err(e) => self.end_folder_op(Err(e), callback),
        }
    }

    /// Checks shared by folder moves; returns the destination store
    fn prepare_transfer(
        &self,
        info: &FolderInfo,
        parent: &ParentRef,
        name: &str,
        delete_original: bool,
    ) -> CoreResult<Arc<dyn Store>> {
        if delete_original && !FolderCapabilities::of_folder(info).can_move() {
            return Err(CoreError::FolderRules(format!("{} cannot be moved", info.id)));
        }
        if parent.folder().is_some_and(|target| target.is_within(&info.id)) {
            return Err(CoreError::FolderRules(format!(
                "cannot move {} into itself",
                info.id
            )));
        }
        let dest = store_for(self.context(), parent.account())?;
        let parent_caps = parent_capabilities(self.context(), dest.as_ref(), parent)?;
        if !parent_caps.can_write() {
            return Err(CoreError::FolderRules(format!(
                "destination of {} does not accept folders",
                info.id
            )));
        }
        if parent_caps.is_reserved_name(name) {
            return Err(CoreError::FolderRules(format!("{:?} is a reserved name", name)));
        }
        check_name_free(dest.as_ref(), parent, name, None)?;
        Ok(dest)
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_copy(
        &self,
        source: Arc<dyn Store>,
        dest: Arc<dyn Store>,
        info: FolderInfo,
        parent: ParentRef,
        name: String,
        delete_original: bool,
        callback: Option<FolderCallback>,
    ) {
        self.spawn(move |op| {
            let progress = |done: u32, total: u32| op.update_progress(done, total);
            let result = if source.name() == dest.name() {
                block_on(source.copy_folder(&info.id, &parent, &name, delete_original, &progress))
                    .map_err(CoreError::from)
            } else {
                copy_tree_across(&op, source.as_ref(), dest.as_ref(), &info, &parent, &name, delete_original)
            };
            if let Ok(ref copied) = result {
                info!("Transferred folder {} to {}", info.id, copied.id);
            }
            op.end_folder_op(result, callback);
        });
    }

    fn end_folder_op(&self, result: CoreResult<FolderInfo>, callback: Option<FolderCallback>) {
        let info = match result {
            Ok(info) => {
                self.succeed();
                Some(info)
            }
            Err(e) => {
                self.fail(e);
                None
            }
        };
        if let Some(callback) = callback {
            self.idle(move |op| callback(op, info.as_ref()));
        }
        self.notify_end();
    }
}

/// Recreate a folder tree in another account, message by message
fn copy_tree_across(
    op: &MailOperation,
    source: &dyn Store,
    dest: &dyn Store,
    info: &FolderInfo,
    parent: &ParentRef,
    name: &str,
    delete_original: bool,
) -> CoreResult<FolderInfo> {
    let mut tree: Vec<FolderInfo> = block_on(source.list_folders(false))?
        .into_iter()
        .filter(|f| f.id.is_within(&info.id))
        .collect();
    tree.sort_by_key(|f| f.id.path.matches('/').count());

    let total = tree.len() as u32;
    let mut created: HashMap<FolderId, FolderId> = HashMap::new();
    let mut root = None;
    for (position, folder) in tree.iter().enumerate() {
        if op.is_canceled() {
            return Err(CoreError::OperationCanceled);
        }
        let (target, folder_name) = if folder.id == info.id {
            (parent.clone(), name)
        } else {
            let new_parent = folder
                .parent
                .as_ref()
                .and_then(|p| created.get(p))
                .cloned()
                .ok_or_else(|| CoreError::ItemNotFound(format!("parent of {}", folder.id)))?;
            (ParentRef::Folder(new_parent), folder.name.as_str())
        };
        let copy = block_on(dest.create_folder(&target, folder_name))?;
        for header in block_on(source.headers(&folder.id))? {
            let message = block_on(source.get_message(&header))?;
            block_on(dest.add_message(&copy.id, message))?;
        }
        created.insert(folder.id.clone(), copy.id.clone());
        root.get_or_insert(copy);
        op.update_progress(position as u32 + 1, total);
    }
    if delete_original {
        block_on(source.remove_folder(&info.id))?;
    }
    root.ok_or_else(|| CoreError::ItemNotFound(info.id.to_string()))
}
